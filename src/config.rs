use serde::{Deserialize, Serialize};

/// Tunable parameters for a keychain node (spec §6). `new` picks defaults,
/// `with_*` methods consume and return `Self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub currency: String,
    /// Max allowed distance between a block's timestamp and wall-clock
    /// "now", in seconds (spec §4.4 step 2).
    pub ts_interval: i64,
    /// Seconds a certification link stays valid before it's obsolete
    /// (spec §3 invariant, testable property B4: 2629800 in the
    /// reference scenario).
    pub sig_validity: i64,
    /// Minimum distinct certifiers a newcomer needs (reference scenario: 2).
    pub sig_qty: usize,
    /// Base proof-of-work difficulty, in leading zero hex digits
    /// (reference scenario: 1).
    pub pow_zero_min: u32,
    /// WoT reachability hop bound used by `pathWithin`/
    /// `membersNotReachedWithin` (spec §4.2 default: 3).
    pub max_hops: u32,
    /// Cooldown period used to decay a high-difficulty issuer's penalty
    /// back down (spec §4.4 step 3, §6). In blocks when `pow_period_c` is
    /// true; otherwise scaled as `powPeriod * currentMembersCount / 100`.
    pub pow_period: i64,
    pub pow_period_c: bool,
    /// Seconds a pending membership declaration survives in the pool
    /// before it's dropped (spec §3 "Lifecycle").
    pub membership_ttl: i64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            currency: "default_currency".to_string(),
            ts_interval: 3600,
            sig_validity: 2_629_800,
            sig_qty: 2,
            pow_zero_min: 1,
            max_hops: 3,
            pow_period: 20,
            pow_period_c: true,
            membership_ttl: 2_629_800,
        }
    }
}

impl NodeConfig {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            ..Self::default()
        }
    }

    pub fn with_ts_interval(mut self, ts_interval: i64) -> Self {
        self.ts_interval = ts_interval;
        self
    }

    pub fn with_sig_validity(mut self, sig_validity: i64) -> Self {
        self.sig_validity = sig_validity;
        self
    }

    pub fn with_sig_qty(mut self, sig_qty: usize) -> Self {
        self.sig_qty = sig_qty;
        self
    }

    pub fn with_pow_zero_min(mut self, pow_zero_min: u32) -> Self {
        self.pow_zero_min = pow_zero_min;
        self
    }

    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_pow_period(mut self, pow_period: i64) -> Self {
        self.pow_period = pow_period;
        self
    }

    pub fn with_pow_period_c(mut self, pow_period_c: bool) -> Self {
        self.pow_period_c = pow_period_c;
        self
    }

    pub fn with_membership_ttl(mut self, membership_ttl: i64) -> Self {
        self.membership_ttl = membership_ttl;
        self
    }

    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
