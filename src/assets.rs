/// Tradable underlyings and their fallback volatility.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Asset {
    pub code: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    /// Exchange symbol (quoted in USDT)
    pub symbol: &'static str,
    /// Annualized, as a decimal
    pub default_vol: f64,
    pub free_tier: bool,
}

pub static ASSETS: [Asset; 4] = [
    Asset {
        code: "BTC",
        name: "Bitcoin",
        icon: "₿",
        symbol: "BTCUSDT",
        default_vol: 0.55,
        free_tier: true,
    },
    Asset {
        code: "ETH",
        name: "Ethereum",
        icon: "Ξ",
        symbol: "ETHUSDT",
        default_vol: 0.65,
        free_tier: false,
    },
    Asset {
        code: "SOL",
        name: "Solana",
        icon: "◎",
        symbol: "SOLUSDT",
        default_vol: 0.85,
        free_tier: false,
    },
    Asset {
        code: "XRP",
        name: "XRP",
        icon: "✕",
        symbol: "XRPUSDT",
        default_vol: 0.95,
        free_tier: false,
    },
];

/// Case-insensitive lookup by code.
pub fn find(code: &str) -> Option<&'static Asset> {
    ASSETS.iter().find(|a| a.code.eq_ignore_ascii_case(code.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(find("btc").map(|a| a.symbol), Some("BTCUSDT"));
        assert_eq!(find(" XRP ").map(|a| a.default_vol), Some(0.95));
        assert!(find("DOGE").is_none());
    }

    #[test]
    fn test_only_btc_is_free() {
        let free: Vec<_> = ASSETS.iter().filter(|a| a.free_tier).map(|a| a.code).collect();
        assert_eq!(free, vec!["BTC"]);
    }
}
