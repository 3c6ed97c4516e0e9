use animica_core::amount::Amount;
use serde::{Deserialize, Serialize};

/// Balance and nonce for one address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: Amount,
    pub nonce: u64,
}
