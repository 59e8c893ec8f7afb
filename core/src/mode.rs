use serde::{Deserialize, Serialize};

/// Numeric interpretation applied by the next arithmetic instruction.
///
/// Every instruction except the two mode setters writes `Signed` back as its
/// last act, so `Unsigned`/`Float` last exactly one subsequent instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpMode {
    #[default]
    Signed,
    Unsigned,
    Float,
}

/// How the next control-transfer instruction interprets its target.
///
/// `Relative` is consumed (reset to `Direct`) by the first control transfer
/// that sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddrMode {
    #[default]
    Direct,
    Relative,
}
