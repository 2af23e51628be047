use dexa_models::tool::ToolDescriptor;

pub const GET_WALLET_BALANCE: &str = "get_wallet_balance";
pub const GET_ALL_POSITIONS: &str = "get_all_positions";
pub const GET_TOKEN_POSITIONS: &str = "get_token_positions";
pub const SEARCH_TOKEN: &str = "search_token";
pub const SCAN_TOKEN: &str = "scan_token";
pub const GET_TRENDING_PAIRS: &str = "get_trending_pairs";
pub const BUY_TOKEN: &str = "buy_token";
pub const SELL_TOKEN: &str = "sell_token";

/// The fixed catalog of tools the model may call.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    /// The trading-assistant catalog.
    pub fn default_catalog() -> Self {
        Self::new(vec![
            ToolDescriptor::new(
                GET_TRENDING_PAIRS,
                "Get trending trading pairs on the market. \
                 Output: price, liquidity, volume and price change per window.",
                "resolution (str, optional): time frame, one of 5m, 1h, 6h, 24h (default: 24h); \
                 limit (int, optional): max pairs to return, 1-10 (default: 5)",
                &[],
            ),
            ToolDescriptor::new(
                GET_WALLET_BALANCE,
                "Check the user's wallet balances. \
                 Output: list of wallet addresses and their SUI balances.",
                "none",
                &[],
            ),
            ToolDescriptor::new(
                SEARCH_TOKEN,
                "Search for token information to assist with buying decisions. \
                 Output: token address, name, symbol and current price.",
                "query (str): token name or symbol",
                &["query"],
            ),
            ToolDescriptor::new(
                BUY_TOKEN,
                "Buy tokens with SUI. Output: purchase transaction status.",
                "token_address (str): token contract address; \
                 amount (float): amount of SUI to spend; \
                 wallet_address (str): the user's wallet address",
                &["token_address", "amount", "wallet_address"],
            ),
            ToolDescriptor::new(
                SELL_TOKEN,
                "Sell a percentage of a token holding. Output: sell transaction status.",
                "token_address (str): token contract address; \
                 percent (float): percentage of the holding to sell, 0-100; \
                 wallet_address (str): the user's wallet address",
                &["token_address", "percent", "wallet_address"],
            ),
            ToolDescriptor::new(
                GET_ALL_POSITIONS,
                "Get all token positions from the user's wallets to review holdings or \
                 prepare for selling. Output: tokens with balances and wallet.",
                "none",
                &[],
            ),
            ToolDescriptor::new(
                GET_TOKEN_POSITIONS,
                "Get the user's positions of one token across their wallets.",
                "token_address (str): token contract address",
                &["token_address"],
            ),
            ToolDescriptor::new(
                SCAN_TOKEN,
                "Analyze a token's trading metrics from its top pair. \
                 Output: price, market cap, liquidity, volume and transaction counts.",
                "token_address (str): token contract address",
                &["token_address"],
            ),
        ])
    }

    /// Look up a tool. Names match case-insensitively, ignoring surrounding whitespace.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        let name = name.trim();
        self.tools.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::default_catalog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_all_tools() {
        let registry = ToolRegistry::default_catalog();
        assert_eq!(registry.len(), 8);
        for name in [
            GET_WALLET_BALANCE,
            GET_ALL_POSITIONS,
            GET_TOKEN_POSITIONS,
            SEARCH_TOKEN,
            SCAN_TOKEN,
            GET_TRENDING_PAIRS,
            BUY_TOKEN,
            SELL_TOKEN,
        ] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = ToolRegistry::default_catalog();
        assert_eq!(registry.get(" Buy_Token ").unwrap().name, BUY_TOKEN);
        assert!(registry.get("transfer_token").is_none());
    }

    #[test]
    fn trade_tools_declare_required_params() {
        let registry = ToolRegistry::default_catalog();
        assert_eq!(
            registry.get(BUY_TOKEN).unwrap().required,
            vec!["token_address", "amount", "wallet_address"]
        );
        assert_eq!(
            registry.get(SELL_TOKEN).unwrap().required,
            vec!["token_address", "percent", "wallet_address"]
        );
        assert!(registry.get(GET_WALLET_BALANCE).unwrap().required.is_empty());
    }

    #[test]
    fn names_are_unique() {
        let registry = ToolRegistry::default_catalog();
        let mut names = registry.names();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), registry.len());
    }
}
