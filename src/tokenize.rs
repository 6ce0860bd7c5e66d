use std::borrow::Cow;
use std::str::SplitWhitespace;

use tracing::warn;

use crate::logging::PDF_OPERATIONS;

// Path construction and painting (PDF 32000-1:2008 §8.5.2) plus the graphics state,
// text, colour, shading, image, XObject and marked content operators that can appear
// in between. Anything not listed here is treated as an operand.
static OPERATORS: &[&str] = &[
    "w", "J", "j", "M", "d", "ri", "i", "gs", "q", "Q", "cm", "m", "l", "c", "v", "y", "h",
    "re", "S", "s", "f", "F", "f*", "B", "B*", "b", "b*", "n", "W", "W*", "BT", "ET", "Tc",
    "Tw", "Tz", "TL", "Tf", "Tr", "Ts", "Td", "TD", "Tm", "T*", "Tj", "TJ", "'", "\"", "d0",
    "d1", "CS", "cs", "SC", "SCN", "sc", "scn", "G", "g", "RG", "rg", "K", "k", "sh", "BI",
    "ID", "EI", "Do", "MP", "DP", "BMC", "BDC", "EMC", "BX", "EX",
];

pub fn is_operator(token: &str) -> bool {
    OPERATORS.contains(&token)
}

/// One content stream operator together with the raw operand tokens that preceded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation<'a> {
    pub operator: &'a str,
    pub operands: Vec<&'a str>,
}

impl Operation<'_> {
    pub fn operands_are(&self, expected: &[&str]) -> bool {
        self.operands == expected
    }
}

/// Lazy postfix scan over a whitespace separated content stream.
///
/// Operands are kept as opaque strings; consumers decide how to parse them.
pub struct Operations<'a> {
    tokens: SplitWhitespace<'a>,
}

impl<'a> Iterator for Operations<'a> {
    type Item = Operation<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut operands = Vec::new();
        for token in self.tokens.by_ref() {
            if is_operator(token) {
                return Some(Operation {
                    operator: token,
                    operands,
                });
            }
            operands.push(token);
        }
        // Operands trailing the last operator have nothing to attach to.
        None
    }
}

pub fn tokenize_graphics(content: &str) -> Operations<'_> {
    Operations {
        tokens: content.split_whitespace(),
    }
}

/// Decode raw stream bytes for tokenizing, replacing invalid UTF-8.
pub fn decode_content(raw: &[u8]) -> Cow<'_, str> {
    let decoded = String::from_utf8_lossy(raw);
    if let Cow::Owned(_) = decoded {
        warn!(
            target: PDF_OPERATIONS,
            bytes = raw.len(),
            "Content stream is not valid UTF-8, invalid sequences replaced"
        );
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_one_record_per_operator_with_preceding_operands() {
        let ops: Vec<_> =
            tokenize_graphics("q 1 0.952941 0.658824 RG 12.5 w 1 J 0 0 m 3 4 l S Q").collect();

        let expected = vec![
            ("q", vec![]),
            ("RG", vec!["1", "0.952941", "0.658824"]),
            ("w", vec!["12.5"]),
            ("J", vec!["1"]),
            ("m", vec!["0", "0"]),
            ("l", vec!["3", "4"]),
            ("S", vec![]),
            ("Q", vec![]),
        ];
        let actual: Vec<_> = ops.iter().map(|op| (op.operator, op.operands.clone())).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn unknown_tokens_are_operands() {
        let ops: Vec<_> = tokenize_graphics("/FXE2 gs 1 0 0 1 0 0 cm").collect();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operands, vec!["/FXE2"]);
        assert!(ops[1].operands_are(&["1", "0", "0", "1", "0", "0"]));
    }

    #[test]
    fn trailing_operands_are_dropped() {
        let ops: Vec<_> = tokenize_graphics("1 w 2 3").collect();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operator, "w");
    }

    #[test]
    fn empty_stream_has_no_operations() {
        assert_eq!(tokenize_graphics("  \n\t ").count(), 0);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let decoded = decode_content(b"0 0 m \xff 1 1 l");
        let ops: Vec<_> = tokenize_graphics(&decoded).collect();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].operands, vec!["\u{fffd}", "1", "1"]);
    }
}
