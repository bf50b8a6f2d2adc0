// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! A small literal/regex driven lexical analyzer.
//!
//! This is ambient plumbing: it has no say over the design of the LR(1)
//! core, it is just what feeds tokens to it (and, at parse time, to the
//! emitted parsers' pull-based token streams).

use regex::Regex;
use std::fmt;

/// A location within some named source text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    label: String,
    line: usize,
    column: usize,
}

impl Location {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            line: 1,
            column: 1,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.label, self.line, self.column)
        }
    }
}

/// A single lexed token: a handle tag plus the matched text and its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a, H> {
    tag: H,
    lexeme: &'a str,
    location: Location,
}

impl<'a, H: Copy> Token<'a, H> {
    pub fn new(tag: H, lexeme: &'a str, location: Location) -> Self {
        Self {
            tag,
            lexeme,
            location,
        }
    }

    pub fn tag(&self) -> &H {
        &self.tag
    }

    pub fn lexeme(&self) -> &str {
        self.lexeme
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

/// Errors raised while pulling tokens from a [`TokenStream`].
#[derive(Debug, PartialEq)]
pub enum Error<'a, H> {
    UnexpectedText(&'a str, Location),
    AmbiguousMatches(Vec<H>, &'a str, Location),
    AdvancedWhenEmpty(Location),
}

impl<'a, H: fmt::Debug> fmt::Display for Error<'a, H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnexpectedText(text, location) => {
                write!(f, "{}: unexpected text: \"{}\"", location, text)
            }
            Error::AmbiguousMatches(tags, text, location) => {
                write!(
                    f,
                    "{}: ambiguous match for \"{}\": {:?}",
                    location, text, tags
                )
            }
            Error::AdvancedWhenEmpty(location) => {
                write!(f, "{}: advanced past end of input", location)
            }
        }
    }
}

/// A compiled literal/regex lexical analyzer over a caller-supplied handle
/// type (typically a terminal tag enum).
#[derive(Debug)]
pub struct LexicalAnalyzer<H> {
    literal_matches: Vec<(String, H)>,
    regex_matches: Vec<(Regex, H)>,
    skip_regexes: Vec<Regex>,
}

impl<H: Copy + PartialEq> LexicalAnalyzer<H> {
    /// `literals` and `regexes` are (tag, pattern) pairs; `skip_regexes`
    /// match whitespace/comments that are dropped between tokens.
    /// Literal matches always take priority over regex matches of equal
    /// length: they are tried first.
    pub fn new(literals: &[(H, &str)], regexes: &[(H, &str)], skip_regexes: &[&str]) -> Self {
        let mut literal_matches: Vec<(String, H)> = literals
            .iter()
            .map(|(tag, text)| (text.to_string(), *tag))
            .collect();
        // Longest literal first so that e.g. "==" is preferred over "=".
        literal_matches.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let regex_matches: Vec<(Regex, H)> = regexes
            .iter()
            .map(|(tag, pattern)| {
                let anchored = format!("^(?:{})", pattern);
                (
                    Regex::new(&anchored).expect("invalid regex in lexan token definition"),
                    *tag,
                )
            })
            .collect();
        let skip_regexes: Vec<Regex> = skip_regexes
            .iter()
            .map(|pattern| {
                let anchored = format!("^(?:{})", pattern);
                Regex::new(&anchored).expect("invalid regex in lexan skip rule")
            })
            .collect();
        Self {
            literal_matches,
            regex_matches,
            skip_regexes,
        }
    }

    /// Begin tokenizing `text`, attributing locations to `label`.
    pub fn token_stream<'a>(&'a self, text: &'a str, label: &str) -> TokenStream<'a, H> {
        TokenStream {
            lexicon: self,
            text,
            remainder: text,
            location: Location::new(label),
        }
    }

    fn skip_len(&self, text: &str) -> usize {
        let mut total = 0;
        loop {
            let mut advanced = false;
            for regex in &self.skip_regexes {
                if let Some(found) = regex.find(&text[total..]) {
                    if found.end() > 0 {
                        total += found.end();
                        advanced = true;
                        break;
                    }
                }
            }
            if !advanced {
                break;
            }
        }
        total
    }

    /// Find the longest match (literal or regex) at the start of `text`.
    /// Returns the matched length and the tag(s) achieving that length.
    fn longest_match(&self, text: &str) -> Option<(usize, Vec<H>)> {
        let mut best_len = 0;
        let mut best_tags: Vec<H> = vec![];
        for (literal, tag) in &self.literal_matches {
            if text.starts_with(literal.as_str()) {
                let len = literal.len();
                if len > best_len {
                    best_len = len;
                    best_tags = vec![*tag];
                } else if len == best_len && !best_tags.contains(tag) {
                    best_tags.push(*tag);
                }
            }
        }
        if best_len > 0 {
            // A literal match of the winning length always wins outright:
            // literals are exact keywords/punctuation, never ambiguous
            // with each other in a well formed grammar.
            return Some((best_len, best_tags));
        }
        for (regex, tag) in &self.regex_matches {
            if let Some(found) = regex.find(text) {
                let len = found.end();
                if len == 0 {
                    continue;
                }
                if len > best_len {
                    best_len = len;
                    best_tags = vec![*tag];
                } else if len == best_len && !best_tags.contains(tag) {
                    best_tags.push(*tag);
                }
            }
        }
        if best_len == 0 {
            None
        } else {
            Some((best_len, best_tags))
        }
    }
}

/// A pull-based iterator over the tokens of some source text.
#[derive(Debug)]
pub struct TokenStream<'a, H> {
    lexicon: &'a LexicalAnalyzer<H>,
    text: &'a str,
    remainder: &'a str,
    location: Location,
}

impl<'a, H: Copy + PartialEq> TokenStream<'a, H> {
    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl<'a, H: Copy + PartialEq> Iterator for TokenStream<'a, H> {
    type Item = Result<Token<'a, H>, Error<'a, H>>;

    fn next(&mut self) -> Option<Self::Item> {
        let skipped = self.lexicon.skip_len(self.remainder);
        if skipped > 0 {
            let (skipped_text, rest) = self.remainder.split_at(skipped);
            self.location.advance(skipped_text);
            self.remainder = rest;
        }
        if self.remainder.is_empty() {
            return None;
        }
        match self.lexicon.longest_match(self.remainder) {
            None => {
                let bad = &self.remainder[0..self.remainder.chars().next().unwrap().len_utf8()];
                let location = self.location.clone();
                self.location.advance(bad);
                self.remainder = &self.remainder[bad.len()..];
                Some(Err(Error::UnexpectedText(bad, location)))
            }
            Some((len, tags)) if tags.len() > 1 => {
                let text = &self.remainder[0..len];
                let location = self.location.clone();
                self.location.advance(text);
                self.remainder = &self.remainder[len..];
                Some(Err(Error::AmbiguousMatches(tags, text, location)))
            }
            Some((len, tags)) => {
                let text = &self.remainder[0..len];
                let location = self.location.clone();
                self.location.advance(text);
                self.remainder = &self.remainder[len..];
                Some(Ok(Token::new(tags[0], text, location)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag {
        Plus,
        Num,
        Ident,
    }

    fn analyzer() -> LexicalAnalyzer<Tag> {
        LexicalAnalyzer::new(
            &[(Tag::Plus, "+")],
            &[(Tag::Num, r"[0-9]+"), (Tag::Ident, r"[a-zA-Z]+")],
            &[r"\s+"],
        )
    }

    #[test]
    fn lexes_literals_and_regexes() {
        let lexicon = analyzer();
        let tokens: Vec<_> = lexicon
            .token_stream("a1 + 23", "test")
            .map(|r| r.unwrap())
            .map(|t| (*t.tag(), t.lexeme().to_string()))
            .collect();
        assert_eq!(
            tokens,
            vec![
                (Tag::Ident, "a1".to_string()),
                (Tag::Plus, "+".to_string()),
                (Tag::Num, "23".to_string()),
            ]
        );
    }

    #[test]
    fn reports_unexpected_text() {
        let lexicon = analyzer();
        let mut stream = lexicon.token_stream("@", "test");
        assert!(matches!(stream.next(), Some(Err(Error::UnexpectedText(_, _)))));
    }

    #[test]
    fn tracks_line_and_column() {
        let lexicon = analyzer();
        let mut stream = lexicon.token_stream("a\n+", "test");
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.location().line(), 1);
        let second = stream.next().unwrap().unwrap();
        assert_eq!(second.location().line(), 2);
        assert_eq!(second.location().column(), 1);
    }
}
