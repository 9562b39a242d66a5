use crate::execution::{BlockContext, ExecutionContext, ExecutionStatus, HaltReason};
use crate::hardfork::{ForkConfig, Hardfork};
use crate::inspector::{Inspector, StepInfo, StructLogCollector};
use crate::interpreter::{create2_address, create_address};
use crate::state::StateDB;
use crate::{Evm, EvmError};
use ember_types::{Address, H256, U256};

fn test_block() -> BlockContext {
    BlockContext {
        coinbase: Address::from_bytes([0u8; 20]),
        number: U256::from(1),
        timestamp: U256::from(1000),
        difficulty: U256::from(1_000_000),
        gas_limit: U256::from(10_000_000),
        chain_id: U256::one(),
        block_hashes: vec![],
    }
}

fn caller() -> Address {
    Address::from_bytes([0x01; 20])
}

fn contract() -> Address {
    Address::from_bytes([0x02; 20])
}

fn context_for(code: Vec<u8>, gas_limit: u64) -> ExecutionContext {
    ExecutionContext::new(caller(), contract(), U256::zero(), code, vec![], gas_limit, test_block())
}

fn run(code: Vec<u8>) -> crate::ExecutionResult {
    let mut evm = Evm::new();
    evm.execute(context_for(code, 1_000_000)).unwrap()
}

fn push_address(program: &mut Vec<u8>, address: &Address) {
    program.push(0x73); // PUSH20
    program.extend_from_slice(address.as_bytes());
}

#[test]
fn test_add_program_gas_and_stack() {
    // PUSH1 0x03, PUSH1 0x05, ADD, STOP
    let code = vec![0x60, 0x03, 0x60, 0x05, 0x01, 0x00];

    let mut evm = Evm::new();
    let mut collector = StructLogCollector::default();
    let result = evm
        .execute_with_inspector(context_for(code, 0xffff), &mut collector)
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.gas_used, 9);
    assert!(result.return_data.is_empty());

    // At the STOP step the stack holds exactly the sum
    let last = collector.logs.last().unwrap();
    assert_eq!(last.op, "STOP");
    assert_eq!(last.stack, vec![U256::from(8)]);
}

#[test]
fn test_mstore_memory_billing() {
    // PUSH1 0x00, PUSH1 0x00, MSTORE, STOP: one word of memory, cost 3
    let code = vec![0x60, 0x00, 0x60, 0x00, 0x52, 0x00];
    let result = run(code);

    assert!(result.is_success());
    // Two pushes + MSTORE base + one memory word
    assert_eq!(result.gas_used, 3 + 3 + 3 + 3);
}

#[test]
fn test_memory_charged_once_for_same_word() {
    // Writing the same word twice pays expansion only the first time
    let once = run(vec![0x60, 0x00, 0x60, 0x00, 0x52, 0x00]);
    let twice = run(vec![
        0x60, 0x00, 0x60, 0x00, 0x52, 0x60, 0x00, 0x60, 0x00, 0x52, 0x00,
    ]);
    assert_eq!(twice.gas_used, once.gas_used + 3 + 3 + 3);
}

#[test]
fn test_simple_return() {
    // PUSH1 0x2a, PUSH1 0x00, MSTORE, PUSH1 0x20, PUSH1 0x00, RETURN
    let code = vec![0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
    let result = run(code);

    assert!(result.is_success());
    assert_eq!(result.return_data.len(), 32);
    assert_eq!(U256::from_big_endian(&result.return_data), U256::from(0x2a));
}

#[test]
fn test_valid_jump() {
    // PUSH1 0x04, JUMP, INVALID, JUMPDEST, STOP
    let code = vec![0x60, 0x04, 0x56, 0xfe, 0x5b, 0x00];
    let result = run(code);
    assert!(result.is_success());
}

#[test]
fn test_jump_into_push_immediate_traps() {
    // PUSH1 0x04, JUMP, PUSH2 0x5b5b, STOP: byte 4 looks like a
    // JUMPDEST but sits inside the immediate
    let code = vec![0x60, 0x04, 0x56, 0x61, 0x5b, 0x5b, 0x00];
    let result = run(code);
    assert_eq!(result.status, ExecutionStatus::Halt(HaltReason::InvalidJump));
    assert_eq!(result.gas_used, 1_000_000);
}

#[test]
fn test_conditional_jump_not_taken() {
    // PUSH1 0x00, PUSH1 0x07, JUMPI, PUSH1 0x01, STOP, JUMPDEST, STOP
    let code = vec![0x60, 0x00, 0x60, 0x07, 0x57, 0x60, 0x01, 0x00, 0x5b, 0x00];
    let result = run(code);
    assert!(result.is_success());
}

#[test]
fn test_sstore_sentry_at_istanbul() {
    // Exactly the sentry left when SSTORE runs: trap before metering
    let code = vec![0x60, 0x01, 0x60, 0x00, 0x55];
    let mut evm = Evm::new();
    let result = evm.execute(context_for(code, 3 + 3 + 2_300)).unwrap();

    assert_eq!(result.status, ExecutionStatus::Halt(HaltReason::OutOfGas));
    assert_eq!(result.gas_used, 2_306);
}

#[test]
fn test_sstore_and_sload_roundtrip() {
    // PUSH1 0x42, PUSH1 0x01, SSTORE, PUSH1 0x01, SLOAD, return it
    let code = vec![
        0x60, 0x42, 0x60, 0x01, 0x55, 0x60, 0x01, 0x54, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60,
        0x00, 0xf3,
    ];
    let result = run(code);
    assert!(result.is_success());
    assert_eq!(U256::from_big_endian(&result.return_data), U256::from(0x42));
}

#[test]
fn test_sstore_clear_refund_legacy() {
    let mut evm = Evm::with_config(ForkConfig::new(Hardfork::Byzantium));
    evm.state_mut().set_storage(
        contract(),
        H256::from_low_u64_be(1),
        H256::from_low_u64_be(5),
    );

    // PUSH1 0x00, PUSH1 0x01, SSTORE, STOP
    let code = vec![0x60, 0x00, 0x60, 0x01, 0x55, 0x00];
    let result = evm.execute(context_for(code, 100_000)).unwrap();

    assert!(result.is_success());
    assert_eq!(result.gas_refund, 15_000);
    assert_eq!(result.gas_used, 3 + 3 + 5_000);
    assert_eq!(
        evm.state().get_storage(&contract(), &H256::from_low_u64_be(1)),
        H256::zero()
    );
}

#[test]
fn test_revert_preserves_gas_and_data() {
    // PUSH1 0x2a, PUSH1 0x00, MSTORE, PUSH1 0x20, PUSH1 0x00, REVERT
    let code = vec![0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xfd];
    let result = run(code);

    assert!(result.is_revert());
    assert_eq!(U256::from_big_endian(&result.return_data), U256::from(0x2a));
    assert!(result.gas_used < 1_000_000);
    // Reverted frames surface no logs or refunds
    assert!(result.logs.is_empty());
    assert_eq!(result.gas_refund, 0);
}

#[test]
fn test_out_of_gas_consumes_everything() {
    let code = vec![0x60, 0x01, 0x60, 0x02, 0x01, 0x00];
    let mut evm = Evm::new();
    let result = evm.execute(context_for(code, 5)).unwrap();

    assert_eq!(result.status, ExecutionStatus::Halt(HaltReason::OutOfGas));
    assert_eq!(result.gas_used, 5);
}

#[test]
fn test_invalid_opcode() {
    let result = run(vec![0x0c]);
    assert_eq!(
        result.status,
        ExecutionStatus::Halt(HaltReason::InvalidOpcode(0x0c))
    );
    assert_eq!(result.gas_used, 1_000_000);
}

#[test]
fn test_stack_underflow() {
    let result = run(vec![0x01]); // ADD on empty stack
    assert_eq!(
        result.status,
        ExecutionStatus::Halt(HaltReason::StackUnderflow)
    );
}

#[test]
fn test_returndatacopy_out_of_range() {
    // RETURNDATACOPY(0, 0, 1) with an empty return buffer
    let code = vec![0x60, 0x01, 0x60, 0x00, 0x60, 0x00, 0x3e, 0x00];
    let result = run(code);
    assert_eq!(result.status, ExecutionStatus::Halt(HaltReason::OutOfRange));
}

#[test]
fn test_log_emission() {
    // topic, size, offset on the stack, then LOG1
    let code = vec![0x60, 0xaa, 0x60, 0x00, 0x60, 0x00, 0xa1, 0x00];
    let result = run(code);

    assert!(result.is_success());
    assert_eq!(result.logs.len(), 1);
    assert_eq!(result.logs[0].address, contract());
    assert_eq!(result.logs[0].topics, vec![H256::from_low_u64_be(0xaa)]);
    assert!(result.logs[0].data.is_empty());
}

#[test]
fn test_static_call_blocks_sstore() {
    let callee = Address::from_bytes([0xbb; 20]);

    let mut evm = Evm::new();
    evm.state_mut().set_code(callee, vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x00]);

    // STATICCALL(gas, callee, 0, 0, 0, 0) then return the flag word
    let mut code = vec![
        0x60, 0x00, // out_len
        0x60, 0x00, // out_off
        0x60, 0x00, // in_len
        0x60, 0x00, // in_off
    ];
    push_address(&mut code, &callee);
    code.extend_from_slice(&[0x61, 0xff, 0xff, 0xfa]); // PUSH2 gas, STATICCALL
    code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3]);

    let result = evm.execute(context_for(code, 500_000)).unwrap();

    assert!(result.is_success());
    // The sub-call trapped on the static write and pushed zero
    assert_eq!(U256::from_big_endian(&result.return_data), U256::zero());
    assert_eq!(
        evm.state().get_storage(&callee, &H256::zero()),
        H256::zero()
    );
}

#[test]
fn test_call_transfers_value() {
    let recipient = Address::from_bytes([0xcc; 20]);

    let mut evm = Evm::new();
    evm.state_mut().set_balance(contract(), U256::from(100));

    // CALL(gas, recipient, 40, 0, 0, 0, 0); return the flag
    let mut code = vec![
        0x60, 0x00, // out_len
        0x60, 0x00, // out_off
        0x60, 0x00, // in_len
        0x60, 0x00, // in_off
        0x60, 0x28, // value = 40
    ];
    push_address(&mut code, &recipient);
    code.extend_from_slice(&[0x62, 0x01, 0xff, 0xff, 0xf1]); // PUSH3 gas, CALL
    code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3]);

    let result = evm.execute(context_for(code, 500_000)).unwrap();

    assert!(result.is_success());
    assert_eq!(U256::from_big_endian(&result.return_data), U256::one());
    assert_eq!(evm.state().get_balance(&contract()), U256::from(60));
    assert_eq!(evm.state().get_balance(&recipient), U256::from(40));
}

#[test]
fn test_call_with_insufficient_balance_pushes_zero() {
    let recipient = Address::from_bytes([0xcc; 20]);

    let mut evm = Evm::new();
    // Balance 10, sending 40

    evm.state_mut().set_balance(contract(), U256::from(10));

    let mut code = vec![
        0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x28,
    ];
    push_address(&mut code, &recipient);
    code.extend_from_slice(&[0x62, 0x01, 0xff, 0xff, 0xf1]);
    code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3]);

    let result = evm.execute(context_for(code, 500_000)).unwrap();

    assert!(result.is_success());
    assert_eq!(U256::from_big_endian(&result.return_data), U256::zero());
    assert_eq!(evm.state().get_balance(&contract()), U256::from(10));
}

#[test]
fn test_delegatecall_writes_caller_storage() {
    let library = Address::from_bytes([0xdd; 20]);

    let mut evm = Evm::new();
    // Library writes 7 into slot 1 of whoever runs it
    evm.state_mut().set_code(library, vec![0x60, 0x07, 0x60, 0x01, 0x55, 0x00]);

    let mut code = vec![
        0x60, 0x00, // out_len
        0x60, 0x00, // out_off
        0x60, 0x00, // in_len
        0x60, 0x00, // in_off
    ];
    push_address(&mut code, &library);
    code.extend_from_slice(&[0x62, 0x01, 0xff, 0xff, 0xf4, 0x00]); // PUSH3 gas, DELEGATECALL, STOP

    let result = evm.execute(context_for(code, 500_000)).unwrap();

    assert!(result.is_success());
    assert_eq!(
        evm.state().get_storage(&contract(), &H256::from_low_u64_be(1)),
        H256::from_low_u64_be(7)
    );
    assert_eq!(
        evm.state().get_storage(&library, &H256::from_low_u64_be(1)),
        H256::zero()
    );
}

#[test]
fn test_reverted_subcall_discards_state_and_logs() {
    let callee = Address::from_bytes([0xee; 20]);

    let mut evm = Evm::new();
    // Callee: SSTORE(0, 1), LOG0, then REVERT(0, 0)
    evm.state_mut().set_code(
        callee,
        vec![
            0x60, 0x01, 0x60, 0x00, 0x55, // SSTORE
            0x60, 0x00, 0x60, 0x00, 0xa0, // LOG0
            0x60, 0x00, 0x60, 0x00, 0xfd, // REVERT
        ],
    );

    let mut code = vec![
        0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00,
    ];
    push_address(&mut code, &callee);
    code.extend_from_slice(&[0x62, 0x01, 0xff, 0xff, 0xf1, 0x00]);

    let result = evm.execute(context_for(code, 500_000)).unwrap();

    assert!(result.is_success());
    assert!(result.logs.is_empty());
    assert_eq!(
        evm.state().get_storage(&callee, &H256::zero()),
        H256::zero()
    );
}

#[test]
fn test_create_deploys_runtime_code() {
    // Init code returns a single STOP byte as the runtime code
    // PUSH5 <init>, PUSH1 0x00, MSTORE, CREATE(0, 27, 5), return address
    let code = vec![
        0x64, 0x60, 0x01, 0x60, 0x00, 0xf3, // PUSH5 init
        0x60, 0x00, 0x52, // MSTORE at 0
        0x60, 0x05, // len
        0x60, 0x1b, // offset 27
        0x60, 0x00, // value
        0xf0, // CREATE
        0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];

    let mut evm = Evm::new();
    let result = evm.execute(context_for(code, 1_000_000)).unwrap();

    assert!(result.is_success());
    let expected = create_address(&contract(), 0);
    assert_eq!(
        Address::from_word(U256::from_big_endian(&result.return_data)),
        expected
    );
    assert_eq!(evm.state().get_code(&expected), vec![0x00]);
    assert_eq!(evm.state().get_nonce(&expected), 1);
    assert_eq!(evm.state().get_nonce(&contract()), 1);
}

#[test]
fn test_create2_address_derivation() {
    // Same init code as above, salt 0x07
    let code = vec![
        0x64, 0x60, 0x01, 0x60, 0x00, 0xf3, // PUSH5 init
        0x60, 0x00, 0x52, // MSTORE
        0x60, 0x07, // salt
        0x60, 0x05, // len
        0x60, 0x1b, // offset
        0x60, 0x00, // value
        0xf5, // CREATE2
        0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];

    let mut evm = Evm::new();
    let result = evm.execute(context_for(code, 1_000_000)).unwrap();

    assert!(result.is_success());
    let init = vec![0x60, 0x01, 0x60, 0x00, 0xf3];
    let expected = create2_address(&contract(), U256::from(7), &init);
    assert_eq!(
        Address::from_word(U256::from_big_endian(&result.return_data)),
        expected
    );
    assert_eq!(evm.state().get_code(&expected), vec![0x00]);
}

#[test]
fn test_create_collision_pushes_zero() {
    let code = vec![
        0x64, 0x60, 0x01, 0x60, 0x00, 0xf3, 0x60, 0x00, 0x52, // init in memory
        0x60, 0x05, 0x60, 0x1b, 0x60, 0x00, 0xf0, // CREATE
        0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];

    let mut evm = Evm::new();
    // Plant a live account at the derived address
    let target = create_address(&contract(), 0);
    evm.state_mut().set_code(target, vec![0x00]);

    let result = evm.execute(context_for(code, 1_000_000)).unwrap();

    assert!(result.is_success());
    assert_eq!(U256::from_big_endian(&result.return_data), U256::zero());
}

#[test]
fn test_selfdestruct_moves_balance_and_refunds() {
    let beneficiary = Address::from_bytes([0xfe; 20]);

    let mut evm = Evm::new();
    evm.state_mut().set_balance(contract(), U256::from(77));
    evm.state_mut().set_balance(beneficiary, U256::from(1));

    let mut code = Vec::new();
    push_address(&mut code, &beneficiary);
    code.push(0xff); // SELFDESTRUCT

    let result = evm.execute(context_for(code, 100_000)).unwrap();

    assert!(result.is_success());
    assert_eq!(result.gas_refund, 24_000);
    assert_eq!(evm.state().get_balance(&beneficiary), U256::from(78));
    assert!(!evm.state().exists(&contract()));
}

#[test]
fn test_call_gas_cap_keeps_one_64th() {
    let spinner = Address::from_bytes([0xab; 20]);

    let mut evm = Evm::new();
    // Infinite loop: burns whatever it is given
    evm.state_mut().set_code(spinner, vec![0x5b, 0x60, 0x00, 0x56]);

    // Request far more gas than available; the cap forwards all but 1/64
    let mut code = vec![
        0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00,
    ];
    push_address(&mut code, &spinner);
    code.extend_from_slice(&[0x64, 0xff, 0xff, 0xff, 0xff, 0xff, 0xf1, 0x00]); // PUSH5 gas, CALL, STOP

    let result = evm.execute(context_for(code, 640_000)).unwrap();

    // The child exhausted its forwarded share, yet the parent retained
    // enough to finish
    assert!(result.is_success());
    assert!(result.gas_used < 640_000);
    assert!(640_000 - result.gas_used > 8_000);
}

#[test]
fn test_precompile_sha256_through_call() {
    // CALL(gas, 0x02, 0, in(0,0), out(0,32)); return memory
    let sha256_address = Address::from_word(U256::from(2));

    let mut code = vec![
        0x60, 0x20, // out_len
        0x60, 0x00, // out_off
        0x60, 0x00, // in_len
        0x60, 0x00, // in_off
        0x60, 0x00, // value
    ];
    push_address(&mut code, &sha256_address);
    code.extend_from_slice(&[0x61, 0xff, 0xff, 0xf1]); // PUSH2 gas, CALL
    code.extend_from_slice(&[0x50, 0x60, 0x20, 0x60, 0x00, 0xf3]); // POP, RETURN(0, 32)

    let result = run(code);

    assert!(result.is_success());
    assert_eq!(
        hex::encode(&result.return_data),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_subroutines_with_eip2315() {
    // PUSH1 0x04, JUMPSUB, STOP, BEGINSUB, RETURNSUB
    let code = vec![0x60, 0x04, 0x5e, 0x00, 0x5c, 0x5d];

    let mut evm = Evm::with_config(ForkConfig::new(Hardfork::Istanbul).with_eips(vec![2315]));
    let result = evm.execute(context_for(code.clone(), 100_000)).unwrap();
    assert!(result.is_success());

    // Without the EIP the opcode byte is undefined
    let mut plain = Evm::new();
    let result = plain.execute(context_for(code, 100_000)).unwrap();
    assert_eq!(
        result.status,
        ExecutionStatus::Halt(HaltReason::InvalidOpcode(0x5e))
    );
}

#[test]
fn test_step_hook_error_is_fatal() {
    struct Abort;
    impl Inspector for Abort {
        fn on_step(&mut self, step: StepInfo<'_>) -> crate::EvmResult<()> {
            if step.pc > 0 {
                Err(EvmError::Internal("observer gave up".to_string()))
            } else {
                Ok(())
            }
        }
    }

    let code = vec![0x60, 0x01, 0x60, 0x02, 0x01, 0x00];
    let mut evm = Evm::new();
    let result = evm.execute_with_inspector(context_for(code, 100_000), &mut Abort);

    assert!(matches!(result, Err(EvmError::Hook(_))));
}

#[test]
fn test_gas_left_is_monotone_across_steps() {
    let code = vec![
        0x60, 0x01, 0x60, 0x02, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];

    let mut evm = Evm::new();
    let mut collector = StructLogCollector::default();
    evm.execute_with_inspector(context_for(code, 100_000), &mut collector)
        .unwrap();

    let gas_points: Vec<u64> = collector.logs.iter().map(|log| log.gas).collect();
    assert!(gas_points.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_stack_depth_stays_bounded() {
    // DUP1 loop would overflow the stack: PUSH1 1, then DUP1 x N
    let mut code = vec![0x60, 0x01];
    code.extend(std::iter::repeat(0x80).take(1100));

    let result = run(code);
    assert_eq!(
        result.status,
        ExecutionStatus::Halt(HaltReason::StackOverflow)
    );
}

#[test]
fn test_exp_dynamic_gas() {
    // EXP base fee 10 + 50/byte of exponent at Istanbul
    // PUSH2 0x0100 (exponent), PUSH1 0x02 (base), EXP, STOP
    let code = vec![0x61, 0x01, 0x00, 0x60, 0x02, 0x0a, 0x00];
    let result = run(code);
    assert!(result.is_success());
    // 3 + 3 + (10 + 2 * 50)
    assert_eq!(result.gas_used, 116);
}

#[test]
fn test_division_by_zero_is_zero() {
    // PUSH1 0 (divisor), PUSH1 5 (dividend), DIV -> 0
    let code = vec![0x60, 0x00, 0x60, 0x05, 0x04, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
    let result = run(code);
    assert!(result.is_success());
    assert_eq!(U256::from_big_endian(&result.return_data), U256::zero());
}
