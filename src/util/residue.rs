//! Residue alphabet: 0 is the sentinel `$`, letters `A..=Z` map to 1..=26.

pub const SIGMA: usize = 27; // {0:$, 1:A, 2:B, ..., 26:Z}

pub const SENTINEL: u8 = 0;

/// Code of the "unknown" ambiguity symbol.
pub const UNKNOWN: u8 = b'X' - b'A' + 1;

/// The 22 residues that stand only for themselves.
pub const CONCRETE: &[u8] = b"ACDEFGHIKLMNOPQRSTUVWY";

/// Ambiguity symbols with the concrete residues they stand for.
/// `X` is handled separately: it stands for every concrete residue.
pub const AMBIGUOUS: &[(u8, &[u8])] = &[(b'B', b"DN"), (b'J', b"IL"), (b'Z', b"EQ")];

#[inline]
pub fn to_code(b: u8) -> Option<u8> {
    let up = b.to_ascii_uppercase();
    if up.is_ascii_uppercase() {
        Some(up - b'A' + 1)
    } else {
        None
    }
}

#[inline]
pub fn from_code(a: u8) -> u8 {
    match a {
        0 => b'$',
        1..=26 => b'A' + a - 1,
        _ => b'X',
    }
}

#[inline]
pub fn is_concrete(code: u8) -> bool {
    code != SENTINEL && CONCRETE.contains(&from_code(code))
}

/// Bitmask over codes of the concrete residues a symbol stands for.
pub fn expansion_mask(code: u8) -> u32 {
    let sym = from_code(code);
    if code == SENTINEL {
        return 0;
    }
    if code == UNKNOWN {
        return concrete_mask();
    }
    match AMBIGUOUS.iter().find(|(s, _)| *s == sym) {
        Some((_, members)) => members.iter().fold(0u32, |m, &b| m | bit(b)),
        None => 1u32 << code,
    }
}

pub fn concrete_mask() -> u32 {
    CONCRETE.iter().fold(0u32, |m, &b| m | bit(b))
}

#[inline]
fn bit(b: u8) -> u32 {
    1u32 << (b - b'A' + 1)
}

/// Encode a query, failing on the first byte outside the alphabet.
pub fn encode_query(query: &[u8]) -> Result<Vec<u8>, (usize, u8)> {
    query
        .iter()
        .enumerate()
        .map(|(i, &b)| to_code(b).ok_or((i, b)))
        .collect()
}

pub fn decode(codes: &[u8]) -> String {
    codes.iter().map(|&c| from_code(c) as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_letters() {
        for b in b'A'..=b'Z' {
            let c = to_code(b).unwrap();
            assert!(c >= 1 && (c as usize) < SIGMA);
            assert_eq!(from_code(c), b);
            assert_eq!(to_code(b.to_ascii_lowercase()), Some(c));
        }
        assert_eq!(to_code(b'*'), None);
        assert_eq!(to_code(b'1'), None);
    }

    #[test]
    fn ambiguity_expansions() {
        let b = to_code(b'B').unwrap();
        let d = to_code(b'D').unwrap();
        let n = to_code(b'N').unwrap();
        assert_eq!(expansion_mask(b), (1 << d) | (1 << n));
        assert_eq!(expansion_mask(UNKNOWN).count_ones(), 22);
        assert_eq!(expansion_mask(SENTINEL), 0);
        assert!(is_concrete(d));
        assert!(!is_concrete(b));
        assert!(!is_concrete(UNKNOWN));
    }

    #[test]
    fn encode_query_reports_bad_symbol() {
        assert_eq!(encode_query(b"mkv").unwrap(), vec![13, 11, 22]);
        assert_eq!(encode_query(b"MK1V"), Err((2, b'1')));
    }
}
