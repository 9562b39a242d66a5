use ember_types::{Address, H256, U256};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code: Vec<u8>,
    pub storage: HashMap<H256, H256>,
}

impl Account {
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code.is_empty()
    }
}

/// World-state boundary consumed by the interpreter. Checkpoints nest
/// and commit or revert in LIFO order.
pub trait StateDB {
    fn get_account(&self, address: &Address) -> Option<Account>;
    fn set_account(&mut self, address: Address, account: Account);
    fn remove_account(&mut self, address: &Address);

    fn exists(&self, address: &Address) -> bool;
    fn is_empty(&self, address: &Address) -> bool;

    fn get_balance(&self, address: &Address) -> U256;
    fn set_balance(&mut self, address: Address, balance: U256);
    fn get_nonce(&self, address: &Address) -> u64;
    fn increment_nonce(&mut self, address: Address);

    fn get_code(&self, address: &Address) -> Vec<u8>;
    fn set_code(&mut self, address: Address, code: Vec<u8>);

    fn get_storage(&self, address: &Address, key: &H256) -> H256;
    /// Writing a zero value deletes the slot: zero and absent are the
    /// same canonical state.
    fn set_storage(&mut self, address: Address, key: H256, value: H256);
    /// Value of the slot at the start of the current transaction.
    fn get_original_storage(&self, address: &Address, key: &H256) -> H256;

    fn mark_destroyed(&mut self, address: Address);
    fn is_destroyed(&self, address: &Address) -> bool;

    fn checkpoint(&mut self);
    fn commit(&mut self);
    fn revert(&mut self);
}

/// HashMap-backed state with whole-map snapshots per checkpoint.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    accounts: HashMap<Address, Account>,
    destroyed: HashSet<Address>,
    original: HashMap<Address, Account>,
    snapshots: Vec<(HashMap<Address, Account>, HashSet<Address>)>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the original-storage snapshot consulted by net SSTORE
    /// metering. Called once per outer transaction.
    pub fn begin_transaction(&mut self) {
        self.original = self.accounts.clone();
        self.destroyed.clear();
    }

    /// Apply pending self-destructs. Called after the outer frame
    /// commits.
    pub fn delete_destroyed(&mut self) {
        for address in std::mem::take(&mut self.destroyed) {
            self.accounts.remove(&address);
        }
    }

    pub fn checkpoint_depth(&self) -> usize {
        self.snapshots.len()
    }
}

impl StateDB for MemoryState {
    fn get_account(&self, address: &Address) -> Option<Account> {
        self.accounts.get(address).cloned()
    }

    fn set_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    fn remove_account(&mut self, address: &Address) {
        self.accounts.remove(address);
    }

    fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    fn is_empty(&self, address: &Address) -> bool {
        self.accounts
            .get(address)
            .map(Account::is_empty)
            .unwrap_or(true)
    }

    fn get_balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        self.accounts.entry(address).or_default().balance = balance;
    }

    fn get_nonce(&self, address: &Address) -> u64 {
        self.accounts
            .get(address)
            .map(|account| account.nonce)
            .unwrap_or(0)
    }

    fn increment_nonce(&mut self, address: Address) {
        let account = self.accounts.entry(address).or_default();
        account.nonce = account.nonce.saturating_add(1);
    }

    fn get_code(&self, address: &Address) -> Vec<u8> {
        self.accounts
            .get(address)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    fn set_code(&mut self, address: Address, code: Vec<u8>) {
        self.accounts.entry(address).or_default().code = code;
    }

    fn get_storage(&self, address: &Address, key: &H256) -> H256 {
        self.accounts
            .get(address)
            .and_then(|account| account.storage.get(key))
            .copied()
            .unwrap_or_default()
    }

    fn set_storage(&mut self, address: Address, key: H256, value: H256) {
        let account = self.accounts.entry(address).or_default();
        if value.is_zero() {
            account.storage.remove(&key);
        } else {
            account.storage.insert(key, value);
        }
    }

    fn get_original_storage(&self, address: &Address, key: &H256) -> H256 {
        self.original
            .get(address)
            .and_then(|account| account.storage.get(key))
            .copied()
            .unwrap_or_default()
    }

    fn mark_destroyed(&mut self, address: Address) {
        self.destroyed.insert(address);
    }

    fn is_destroyed(&self, address: &Address) -> bool {
        self.destroyed.contains(address)
    }

    fn checkpoint(&mut self) {
        self.snapshots
            .push((self.accounts.clone(), self.destroyed.clone()));
    }

    fn commit(&mut self) {
        self.snapshots.pop();
    }

    fn revert(&mut self) {
        if let Some((accounts, destroyed)) = self.snapshots.pop() {
            self.accounts = accounts;
            self.destroyed = destroyed;
        }
    }
}
