//! Table-driven tokenizer.
//!
//! A pull-based maximal-munch scanner over the emitted lexer tables: from
//! each start index it walks the DFA as far as the input allows, remembers
//! the last accepting state crossed, and resets to just past that match.
//! Separator tokens (whitespace and friends) are matched like any other
//! terminal and discarded. End of input yields the reserved dollar token.

use super::automaton::LexerAutomaton;
use super::text::{TextContent, TextPosition, TextSpan};
use crate::error::LexError;
use crate::grammar::{SID_DOLLAR, Sid};
use compact_str::CompactString;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Terminal id; [`SID_DOLLAR`] for the end-of-input token.
    pub sid: Sid,
    pub span: TextSpan,
    pub position: TextPosition,
}

impl Token {
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.sid == SID_DOLLAR
    }

    /// The token's text.
    #[must_use]
    pub fn text(&self, content: &TextContent) -> CompactString {
        content.span_text(self.span)
    }
}

/// The pull-based tokenizer.
pub struct Lexer<'a> {
    automaton: &'a LexerAutomaton,
    content: &'a TextContent,
    index: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(automaton: &'a LexerAutomaton, content: &'a TextContent) -> Self {
        Self {
            automaton,
            content,
            index: 0,
        }
    }

    #[must_use]
    pub const fn content(&self) -> &TextContent {
        self.content
    }

    /// The next token, discarding separators. Blocks (synchronously) until
    /// a token boundary is found; at end of input, returns the dollar token
    /// indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::UnexpectedCharacter`] when no terminal matches
    /// at the current position. The lexer does not advance; callers
    /// recover by calling [`Lexer::skip_one`].
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            if self.index >= self.content.len() {
                let at = u32::try_from(self.index).unwrap_or(u32::MAX);
                return Ok(Token {
                    sid: SID_DOLLAR,
                    span: TextSpan::new(at, 0),
                    position: self.content.position(at),
                });
            }
            let token = self.match_at(self.index)?;
            self.index = token.span.end() as usize;
            if Some(token.sid) == self.automaton.separator() {
                continue;
            }
            return Ok(token);
        }
    }

    /// Longest match starting at `start`.
    fn match_at(&self, start: usize) -> Result<Token, LexError> {
        let mut state = 0u32;
        let mut best: Option<(usize, Sid)> = None;
        let mut index = start;
        if let Some(sid) = self.automaton.state(state).accept {
            best = Some((0, sid));
        }
        while let Some(unit) = self.content.unit(index) {
            match self.automaton.next_on(state, unit) {
                Some(next) => {
                    state = next;
                    index += 1;
                    if let Some(sid) = self.automaton.state(state).accept {
                        best = Some((index - start, sid));
                    }
                }
                None => break,
            }
        }
        match best {
            Some((length, sid)) if length > 0 => {
                let at = u32::try_from(start).unwrap_or(u32::MAX);
                Ok(Token {
                    sid,
                    span: TextSpan::new(at, u32::try_from(length).unwrap_or(u32::MAX)),
                    position: self.content.position(at),
                })
            }
            _ => {
                let at = u32::try_from(start).unwrap_or(u32::MAX);
                // Take the full code point for the message, not half a
                // surrogate pair.
                let length = match self.content.unit(start) {
                    Some(unit) if (0xD800..0xDC00).contains(&unit) => 2,
                    _ => 1,
                };
                Err(LexError::UnexpectedCharacter {
                    text: self.content.span_text(TextSpan::new(at, length)),
                    position: self.content.position(at),
                })
            }
        }
    }

    /// Skip one code point, the recovery step after an error.
    pub fn skip_one(&mut self) {
        let step = match self.content.unit(self.index) {
            Some(unit) if (0xD800..0xDC00).contains(&unit) => 2,
            _ => 1,
        };
        self.index += step;
    }
}

/// Tokenize the whole input, recovering from bad characters by skipping one
/// code point at a time. The trailing dollar token is included.
///
/// # Errors
///
/// Returns every lexical error encountered when there was at least one.
pub fn tokenize(
    automaton: &LexerAutomaton,
    content: &TextContent,
) -> Result<Vec<Token>, Vec<LexError>> {
    let mut lexer = Lexer::new(automaton, content);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    loop {
        match lexer.next_token() {
            Ok(token) => {
                let done = token.is_end();
                tokens.push(token);
                if done {
                    break;
                }
            }
            Err(error) => {
                errors.push(error);
                lexer.skip_one();
            }
        }
    }
    if errors.is_empty() { Ok(tokens) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automata::Nfa;
    use crate::grammar::Grammar;
    use crate::runtime::automaton::LexerAutomaton;

    fn lexer_tables() -> (Grammar, LexerAutomaton) {
        let mut grammar = Grammar::new("lex");
        grammar.add_terminal_named("WS", " ", Nfa::plus(Nfa::from_char(' ')));
        grammar.add_terminal_named("ID", "id", {
            let letter = Nfa::from_span(crate::automata::CharSpan::new(
                u16::from(b'a'),
                u16::from(b'z'),
            ));
            Nfa::plus(letter)
        });
        grammar.add_terminal_named("NUM", "num", {
            let digit = Nfa::from_span(crate::automata::CharSpan::new(
                u16::from(b'0'),
                u16::from(b'9'),
            ));
            Nfa::plus(digit)
        });
        grammar.add_option(Grammar::OPTION_SEPARATOR, "WS");
        let automaton = LexerAutomaton::emit(&grammar);
        (grammar, automaton)
    }

    #[test]
    fn maximal_munch_and_separators() {
        let (grammar, automaton) = lexer_tables();
        let content = TextContent::new("abc  42 x");
        let tokens = tokenize(&automaton, &content).unwrap();
        let id = grammar.terminal_by_name("ID").unwrap();
        let num = grammar.terminal_by_name("NUM").unwrap();
        let kinds: Vec<Sid> = tokens.iter().map(|t| t.sid).collect();
        assert_eq!(kinds, vec![id, num, id, SID_DOLLAR]);
        assert_eq!(tokens[0].text(&content), "abc");
        assert_eq!(tokens[1].text(&content), "42");
        assert_eq!(tokens[2].position.column, 9);
    }

    #[test]
    fn unexpected_character_is_reported_with_position() {
        let (_, automaton) = lexer_tables();
        let content = TextContent::new("ab\n!cd");
        let errors = tokenize(&automaton, &content).unwrap_err();
        assert_eq!(errors.len(), 1);
        let LexError::UnexpectedCharacter { text, position } = &errors[0];
        assert_eq!(text, "!");
        assert_eq!(position.line, 2);
        assert_eq!(position.column, 1);
    }

    #[test]
    fn empty_input_yields_only_the_end_token() {
        let (_, automaton) = lexer_tables();
        let content = TextContent::new("");
        let tokens = tokenize(&automaton, &content).unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_end());
    }

    #[test]
    fn first_declared_terminal_wins_ties() {
        // Two terminals matching the same single character.
        let mut grammar = Grammar::new("tie");
        let first = grammar.add_terminal_named("FIRST", "x", Nfa::from_char('x'));
        grammar.add_terminal_named("SECOND", "x2", Nfa::from_char('x'));
        let automaton = LexerAutomaton::emit(&grammar);
        let content = TextContent::new("x");
        let tokens = tokenize(&automaton, &content).unwrap();
        assert_eq!(tokens[0].sid, first);
    }
}
