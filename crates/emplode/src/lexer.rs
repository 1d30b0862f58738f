//! Hand-written regex-driven lexer (C1, §4.1).

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{EmplodeError, Site};
use crate::token::{Token, TokenKind, ACTIVE_KEYWORDS, RESERVED_WORDS};

struct Rule {
    kind: TokenKind,
    re: Regex,
}

fn rules() -> &'static Vec<Rule> {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule {
                kind: TokenKind::Whitespace,
                re: Regex::new(r"^[ \t\r\n]+").unwrap(),
            },
            Rule {
                kind: TokenKind::Comment,
                re: Regex::new(r"^//[^\n]*").unwrap(),
            },
            Rule {
                kind: TokenKind::Comment,
                re: Regex::new(r"^(?s)/\*.*?\*/").unwrap(),
            },
            Rule {
                kind: TokenKind::String,
                re: Regex::new(r#"^"(\\.|[^"\\])*""#).unwrap(),
            },
            Rule {
                kind: TokenKind::String,
                re: Regex::new(r"^'(\\.|[^'\\])*'").unwrap(),
            },
            Rule {
                kind: TokenKind::String,
                re: Regex::new(r"^`(\\.|[^`\\])*`").unwrap(),
            },
            Rule {
                kind: TokenKind::Number,
                re: Regex::new(r"^[0-9]+(\.[0-9]+)?").unwrap(),
            },
            Rule {
                kind: TokenKind::Identifier,
                re: Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").unwrap(),
            },
            Rule {
                kind: TokenKind::Dots,
                re: Regex::new(r"^\.+").unwrap(),
            },
            // Multi-char digraphs must be tried before the single-symbol
            // fallback so they're recognized atomically.
            Rule {
                kind: TokenKind::Symbol,
                re: Regex::new(r"^(::|==|!=|<=|>=|->|&&|\|\||<<|>>|\+\+|--|\*\*)").unwrap(),
            },
            Rule {
                kind: TokenKind::Symbol,
                re: Regex::new(r"^.").unwrap(),
            },
        ]
    })
}

/// Scan `source` (already a single joined string) into a token stream,
/// dropping whitespace and comments. `origin` names the file or `eval`
/// tag for diagnostics; `line_offset` lets `load_statements` assign each
/// pre-split statement its caller-supplied starting line.
pub fn lex(source: &str, origin: &str) -> Result<Vec<Token>, EmplodeError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut line = 1usize;

    while !rest.is_empty() {
        let mut matched = false;
        for rule in rules() {
            if let Some(m) = rule.re.find(rest) {
                if m.start() != 0 || m.end() == 0 {
                    continue;
                }
                let lexeme = &rest[..m.end()];
                if rule.kind != TokenKind::Whitespace && rule.kind != TokenKind::Comment {
                    let kind = if rule.kind == TokenKind::Identifier && is_keyword(lexeme) {
                        TokenKind::Keyword
                    } else {
                        rule.kind
                    };
                    tokens.push(Token::new(kind, lexeme, line));
                }
                line += lexeme.matches('\n').count();
                rest = &rest[m.end()..];
                matched = true;
                break;
            }
        }
        if !matched {
            let bad = rest.chars().next().unwrap();
            return Err(EmplodeError::lex(
                Site::new(origin, line, ""),
                format!("unmatched character '{bad}'"),
            ));
        }
    }

    Ok(tokens)
}

fn is_keyword(word: &str) -> bool {
    RESERVED_WORDS.contains(&word) || ACTIVE_KEYWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_whitespace_and_comments() {
        let toks = lex("Var a = 1; // trailing\n/* block */ Var b;", "test").unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert!(!kinds.contains(&TokenKind::Comment));
        assert!(!kinds.contains(&TokenKind::Whitespace));
    }

    #[test]
    fn number_then_identifier() {
        let toks = lex("0a", "test").unwrap();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].kind, TokenKind::Number);
        assert_eq!(toks[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn dots_are_atomic() {
        let toks = lex("..a", "test").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Dots);
        assert_eq!(toks[0].lexeme, "..");
    }

    #[test]
    fn comment_marker_inside_string_is_literal() {
        let toks = lex(r#""http://x""#, "test").unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::String);
    }

    #[test]
    fn digraph_wins_over_single_symbols() {
        let toks = lex("a == b", "test").unwrap();
        assert_eq!(toks[1].lexeme, "==");
    }

    #[test]
    fn unmatched_character_errors() {
        let err = lex("Var a = 1 # bad", "test").unwrap_err();
        assert!(matches!(err, EmplodeError::Lex { .. }));
    }

    #[test]
    fn concatenation_invariant() {
        let src = "Var a = 1 + 2;";
        let toks = lex(src, "test").unwrap();
        let joined: String = toks.iter().map(|t| t.lexeme.as_str()).collect::<Vec<_>>().join("");
        assert_eq!(joined, "Vara=1+2;");
    }
}
