// primitives.rs - primitive dispatch table
// Tokens that map one-to-one onto a single opcode. Symbol tokens are
// matched byte-exact; everything else matches ASCII case-insensitively.

use crate::opcode::Op;

struct Primitive {
    token: &'static str,
    op: Op,
    case_sensitive: bool,
}

// ============================================================================
// DISPATCH TABLE
// ============================================================================

const PRIMITIVES: &[Primitive] = &[
    // Stack operations
    Primitive { token: "DUP", op: Op::Dup, case_sensitive: false },
    Primitive { token: "DROP", op: Op::Drop, case_sensitive: false },
    Primitive { token: "SWAP", op: Op::Swap, case_sensitive: false },
    Primitive { token: "OVER", op: Op::Over, case_sensitive: false },

    // Return stack operations
    Primitive { token: ">R", op: Op::Tor, case_sensitive: false },
    Primitive { token: "R>", op: Op::FromR, case_sensitive: false },
    Primitive { token: "R@", op: Op::RFetch, case_sensitive: false },
    // I is an alias for R@ (innermost DO loop index)
    Primitive { token: "I", op: Op::RFetch, case_sensitive: false },

    // Arithmetic operators
    Primitive { token: "+", op: Op::Add, case_sensitive: true },
    Primitive { token: "-", op: Op::Sub, case_sensitive: true },
    Primitive { token: "*", op: Op::Mul, case_sensitive: true },
    Primitive { token: "/", op: Op::Div, case_sensitive: true },
    Primitive { token: "MOD", op: Op::Mod, case_sensitive: false },
    Primitive { token: "1+", op: Op::Inc, case_sensitive: false },
    Primitive { token: "1-", op: Op::Dec, case_sensitive: false },
    Primitive { token: "U/", op: Op::DivU, case_sensitive: false },
    Primitive { token: "UMOD", op: Op::ModU, case_sensitive: false },

    // Comparison operators
    Primitive { token: "=", op: Op::Eq, case_sensitive: true },
    Primitive { token: "==", op: Op::Eq, case_sensitive: true },
    Primitive { token: "<>", op: Op::Ne, case_sensitive: true },
    Primitive { token: "!=", op: Op::Ne, case_sensitive: true },
    Primitive { token: "<", op: Op::Lt, case_sensitive: true },
    Primitive { token: "<=", op: Op::Le, case_sensitive: true },
    Primitive { token: ">", op: Op::Gt, case_sensitive: true },
    Primitive { token: ">=", op: Op::Ge, case_sensitive: true },
    Primitive { token: "U<", op: Op::LtU, case_sensitive: false },
    Primitive { token: "U<=", op: Op::LeU, case_sensitive: false },

    // Bitwise operators
    Primitive { token: "AND", op: Op::And, case_sensitive: false },
    Primitive { token: "OR", op: Op::Or, case_sensitive: false },
    Primitive { token: "XOR", op: Op::Xor, case_sensitive: false },
    Primitive { token: "INVERT", op: Op::Invert, case_sensitive: false },
    Primitive { token: "LSHIFT", op: Op::Shl, case_sensitive: false },
    Primitive { token: "RSHIFT", op: Op::Shr, case_sensitive: false },
    Primitive { token: "ARSHIFT", op: Op::Sar, case_sensitive: false },

    // Memory access
    Primitive { token: "@", op: Op::Load, case_sensitive: true },
    Primitive { token: "!", op: Op::Store, case_sensitive: true },
    Primitive { token: "C@", op: Op::Load8U, case_sensitive: false },
    Primitive { token: "C!", op: Op::Store8, case_sensitive: false },
    Primitive { token: "W@", op: Op::Load16U, case_sensitive: false },
    Primitive { token: "W!", op: Op::Store16, case_sensitive: false },

    // Local variable access, short forms for slots 0 and 1
    Primitive { token: "L@0", op: Op::LGet0, case_sensitive: false },
    Primitive { token: "L@1", op: Op::LGet1, case_sensitive: false },
    Primitive { token: "L!0", op: Op::LSet0, case_sensitive: false },
    Primitive { token: "L!1", op: Op::LSet1, case_sensitive: false },
];

/// Look up a token in the primitive table. Linear scan; every entry is
/// unique so the first match is the only match.
pub fn lookup(token: &str) -> Option<Op> {
    PRIMITIVES
        .iter()
        .find(|p| {
            if p.case_sensitive {
                token == p.token
            } else {
                token.eq_ignore_ascii_case(p.token)
            }
        })
        .map(|p| p.op)
}
