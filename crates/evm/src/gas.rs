use crate::error::{EvmError, EvmResult};
use crate::hardfork::{ForkConfig, GasSchedule};
use ember_types::{H256, U256, UintExt};

/// Per-frame gas accounting: a non-increasing `left` counter and the
/// transaction refund counter.
#[derive(Debug, Clone, Copy)]
pub struct GasMeter {
    limit: u64,
    left: u64,
    refund: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            left: limit,
            refund: 0,
        }
    }

    pub fn use_gas(&mut self, amount: u64) -> EvmResult<()> {
        if amount > self.left {
            Err(EvmError::OutOfGas)
        } else {
            self.left -= amount;
            Ok(())
        }
    }

    /// Return unused gas from a committed or reverted sub-call.
    pub fn return_gas(&mut self, amount: u64) {
        self.left = self.left.saturating_add(amount).min(self.limit);
    }

    pub fn left(&self) -> u64 {
        self.left
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.limit - self.left
    }

    pub fn refund(&self) -> u64 {
        self.refund
    }

    pub fn refund_gas(&mut self, amount: u64) {
        self.refund = self.refund.saturating_add(amount);
    }

    /// The SSTORE rules keep the counter non-negative; underflow means a
    /// broken invariant, not a consensus condition.
    pub fn sub_refund(&mut self, amount: u64) -> EvmResult<()> {
        self.refund = self
            .refund
            .checked_sub(amount)
            .ok_or_else(|| EvmError::Internal("refund counter underflow".to_string()))?;
        Ok(())
    }

    pub fn apply_refund_delta(&mut self, delta: i64) -> EvmResult<()> {
        if delta >= 0 {
            self.refund_gas(delta as u64);
            Ok(())
        } else {
            self.sub_refund(delta.unsigned_abs())
        }
    }
}

pub fn num_words(len: u64) -> u64 {
    len.div_ceil(32)
}

/// Total cost of holding `words` words of memory.
pub fn memory_cost(g: &GasSchedule, words: u64) -> u64 {
    let linear = words.saturating_mul(g.memory);
    let quadratic = words.saturating_mul(words) / g.quad_coeff_div;
    linear.saturating_add(quadratic)
}

pub fn exp_cost(g: &GasSchedule, exponent: &U256) -> u64 {
    g.exp_byte.saturating_mul(exponent.byte_len() as u64)
}

pub fn sha3_cost(g: &GasSchedule, len: u64) -> u64 {
    g.sha3_word.saturating_mul(num_words(len))
}

pub fn copy_cost(g: &GasSchedule, len: u64) -> u64 {
    g.copy.saturating_mul(num_words(len))
}

pub fn log_cost(g: &GasSchedule, topics: u64, len: u64) -> u64 {
    g.log_topic
        .saturating_mul(topics)
        .saturating_add(g.log_data.saturating_mul(len))
}

/// SSTORE charge and signed refund delta under the active rule set.
///
/// Zero-valued slots are stored as absent entries, so `is_zero` here is
/// exactly the "empty byte string" test the net-metering EIPs specify.
pub fn sstore_gas_and_refund(
    config: &ForkConfig,
    original: H256,
    current: H256,
    new: H256,
    gas_left: u64,
) -> EvmResult<(u64, i64)> {
    let g = config.schedule();

    if config.has_eip2200_sstore_metering() {
        // EIP-2200 sentry: bail out before any metering
        if gas_left <= g.sstore_sentry_eip2200 {
            return Err(EvmError::OutOfGas);
        }
        Ok(net_sstore(
            original,
            current,
            new,
            NetParams {
                noop: g.sstore_noop_eip2200,
                init: g.sstore_init_eip2200,
                clean: g.sstore_clean_eip2200,
                dirty: g.sstore_dirty_eip2200,
                clear_refund: g.sstore_clear_refund_eip2200,
                reset_refund: g.sstore_reset_refund_eip2200,
                reset_clear_refund: g.sstore_reset_clear_refund_eip2200,
            },
        ))
    } else if config.has_net_sstore_metering() {
        Ok(net_sstore(
            original,
            current,
            new,
            NetParams {
                noop: g.net_sstore_noop,
                init: g.net_sstore_init,
                clean: g.net_sstore_clean,
                dirty: g.net_sstore_dirty,
                clear_refund: g.net_sstore_clear_refund,
                reset_refund: g.net_sstore_reset_refund,
                reset_clear_refund: g.net_sstore_reset_clear_refund,
            },
        ))
    } else {
        Ok(legacy_sstore(g, current, new))
    }
}

fn legacy_sstore(g: &GasSchedule, current: H256, new: H256) -> (u64, i64) {
    if new.is_zero() {
        let refund = if current.is_zero() {
            0
        } else {
            g.sstore_clear_refund as i64
        };
        (g.sstore_reset, refund)
    } else if current.is_zero() {
        (g.sstore_set, 0)
    } else {
        (g.sstore_reset, 0)
    }
}

struct NetParams {
    noop: u64,
    init: u64,
    clean: u64,
    dirty: u64,
    clear_refund: u64,
    reset_refund: u64,
    reset_clear_refund: u64,
}

/// EIP-1283/2200 structured net metering over (original, current, new).
fn net_sstore(original: H256, current: H256, new: H256, p: NetParams) -> (u64, i64) {
    if current == new {
        return (p.noop, 0);
    }

    if original == current {
        // Clean slot: first write in this transaction
        if original.is_zero() {
            return (p.init, 0);
        }
        let refund = if new.is_zero() {
            p.clear_refund as i64
        } else {
            0
        };
        return (p.clean, refund);
    }

    // Dirty slot: already written earlier in this transaction
    let mut refund = 0i64;
    if !original.is_zero() {
        if current.is_zero() {
            // Resurrecting a slot whose clear refund was already granted
            refund -= p.clear_refund as i64;
        } else if new.is_zero() {
            refund += p.clear_refund as i64;
        }
    }
    if original == new {
        refund += if original.is_zero() {
            p.reset_clear_refund as i64
        } else {
            p.reset_refund as i64
        };
    }
    (p.dirty, refund)
}
