/// Consensus rule sets in activation order. Ordering over the enum gives
/// the usual "at or after fork X" predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hardfork {
    Frontier,
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    #[default]
    Istanbul,
    MuirGlacier,
}

impl Hardfork {
    pub fn gte(self, other: Hardfork) -> bool {
        self >= other
    }

    pub fn name(self) -> &'static str {
        match self {
            Hardfork::Frontier => "frontier",
            Hardfork::Homestead => "homestead",
            Hardfork::TangerineWhistle => "tangerineWhistle",
            Hardfork::SpuriousDragon => "spuriousDragon",
            Hardfork::Byzantium => "byzantium",
            Hardfork::Constantinople => "constantinople",
            Hardfork::Petersburg => "petersburg",
            Hardfork::Istanbul => "istanbul",
            Hardfork::MuirGlacier => "muirGlacier",
        }
    }
}

/// Active rule set: a hardfork plus additively-enabled EIPs.
#[derive(Debug, Clone)]
pub struct ForkConfig {
    hardfork: Hardfork,
    eips: Vec<u64>,
    schedule: GasSchedule,
}

impl ForkConfig {
    pub fn new(hardfork: Hardfork) -> Self {
        Self {
            hardfork,
            eips: Vec::new(),
            schedule: GasSchedule::for_hardfork(hardfork),
        }
    }

    pub fn with_eips(mut self, eips: Vec<u64>) -> Self {
        self.eips = eips;
        self
    }

    pub fn hardfork(&self) -> Hardfork {
        self.hardfork
    }

    pub fn gte(&self, fork: Hardfork) -> bool {
        self.hardfork.gte(fork)
    }

    pub fn is_active_eip(&self, eip: u64) -> bool {
        self.eips.contains(&eip)
    }

    pub fn schedule(&self) -> &GasSchedule {
        &self.schedule
    }

    /// EIP-1283 net metering: Constantinople only; Petersburg removed it
    /// again.
    pub fn has_net_sstore_metering(&self) -> bool {
        self.hardfork == Hardfork::Constantinople
    }

    /// EIP-2200 net metering with the sentry check.
    pub fn has_eip2200_sstore_metering(&self) -> bool {
        self.gte(Hardfork::Istanbul)
    }
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self::new(Hardfork::default())
    }
}

/// The hardfork parameter table. One interpreter shape; these numbers
/// vary per fork.
#[derive(Debug, Clone)]
pub struct GasSchedule {
    pub base: u64,
    pub very_low: u64,
    pub low: u64,
    pub mid: u64,
    pub high: u64,

    pub exp: u64,
    pub exp_byte: u64,

    pub sha3: u64,
    pub sha3_word: u64,

    pub sload: u64,
    pub balance: u64,
    pub ext_code: u64,
    pub ext_code_hash: u64,

    pub call: u64,
    pub call_value: u64,
    pub call_stipend: u64,
    pub new_account: u64,

    pub create: u64,
    pub code_deposit: u64,
    pub max_code_size: usize,

    pub selfdestruct: u64,
    pub selfdestruct_refund: u64,

    pub sstore_set: u64,
    pub sstore_reset: u64,
    pub sstore_clear_refund: u64,

    pub net_sstore_noop: u64,
    pub net_sstore_init: u64,
    pub net_sstore_clean: u64,
    pub net_sstore_dirty: u64,
    pub net_sstore_clear_refund: u64,
    pub net_sstore_reset_refund: u64,
    pub net_sstore_reset_clear_refund: u64,

    pub sstore_sentry_eip2200: u64,
    pub sstore_noop_eip2200: u64,
    pub sstore_init_eip2200: u64,
    pub sstore_clean_eip2200: u64,
    pub sstore_dirty_eip2200: u64,
    pub sstore_clear_refund_eip2200: u64,
    pub sstore_reset_refund_eip2200: u64,
    pub sstore_reset_clear_refund_eip2200: u64,

    pub memory: u64,
    pub quad_coeff_div: u64,

    pub copy: u64,
    pub log: u64,
    pub log_topic: u64,
    pub log_data: u64,
    pub jumpdest: u64,
    pub blockhash: u64,

    pub begin_sub: u64,
    pub jump_sub: u64,
    pub return_sub: u64,
}

impl GasSchedule {
    /// Frontier numbers, then each fork's repricings layered on top.
    pub fn for_hardfork(fork: Hardfork) -> Self {
        let mut g = GasSchedule {
            base: 2,
            very_low: 3,
            low: 5,
            mid: 8,
            high: 10,

            exp: 10,
            exp_byte: 10,

            sha3: 30,
            sha3_word: 6,

            sload: 50,
            balance: 20,
            ext_code: 20,
            ext_code_hash: 400,

            call: 40,
            call_value: 9_000,
            call_stipend: 2_300,
            new_account: 25_000,

            create: 32_000,
            code_deposit: 200,
            max_code_size: usize::MAX,

            selfdestruct: 0,
            selfdestruct_refund: 24_000,

            sstore_set: 20_000,
            sstore_reset: 5_000,
            sstore_clear_refund: 15_000,

            net_sstore_noop: 200,
            net_sstore_init: 20_000,
            net_sstore_clean: 5_000,
            net_sstore_dirty: 200,
            net_sstore_clear_refund: 15_000,
            net_sstore_reset_refund: 4_800,
            net_sstore_reset_clear_refund: 19_800,

            sstore_sentry_eip2200: 2_300,
            sstore_noop_eip2200: 800,
            sstore_init_eip2200: 20_000,
            sstore_clean_eip2200: 5_000,
            sstore_dirty_eip2200: 800,
            sstore_clear_refund_eip2200: 15_000,
            sstore_reset_refund_eip2200: 4_200,
            sstore_reset_clear_refund_eip2200: 19_200,

            memory: 3,
            quad_coeff_div: 512,

            copy: 3,
            log: 375,
            log_topic: 375,
            log_data: 8,
            jumpdest: 1,
            blockhash: 20,

            begin_sub: 2,
            jump_sub: 10,
            return_sub: 5,
        };

        if fork.gte(Hardfork::TangerineWhistle) {
            // EIP-150 repricings for IO-heavy opcodes
            g.sload = 200;
            g.balance = 400;
            g.ext_code = 700;
            g.call = 700;
            g.selfdestruct = 5_000;
        }

        if fork.gte(Hardfork::SpuriousDragon) {
            // EIP-160 / EIP-170
            g.exp_byte = 50;
            g.max_code_size = 24_576;
        }

        if fork.gte(Hardfork::Istanbul) {
            // EIP-1884 repricings
            g.sload = 800;
            g.balance = 700;
            g.ext_code_hash = 700;
        }

        g
    }
}
