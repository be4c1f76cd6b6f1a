//! Genesis configuration: initial params and account balances

use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tss_module::{Address, Amount, Params};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Genesis {
    pub params: Params,
    pub balances: BTreeMap<Address, Amount>,
}

impl Genesis {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| NodeError::Genesis(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_genesis() {
        let genesis: Genesis = serde_json::from_str(
            r#"{"params": {"signing_period": 60}, "balances": {"alice": 1000}}"#,
        )
        .unwrap();
        assert_eq!(genesis.params.signing_period, 60);
        assert_eq!(genesis.params.max_group_size, Params::default().max_group_size);
        assert_eq!(genesis.balances[&Address::new("alice")], 1000);

        let empty: Genesis = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Genesis::default());
    }
}
