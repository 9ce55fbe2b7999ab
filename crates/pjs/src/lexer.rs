//! The tokenizer.
//!
//! A stateful single-pass scanner with one token of lookahead. Operators
//! and reserved words share one [`Op`] enum whose strum string table doubles
//! as the longest-match alphabet: punctuation is matched by trying
//! successively shorter prefixes (operators are at most four characters),
//! and identifier words are checked against the same table to promote
//! reserved words.
//!
//! The scanner records whether a newline appeared in the whitespace before
//! the lookahead token; the parser consults that flag for automatic
//! semicolon insertion. Template-literal mode is toggled by the parser: in
//! template mode the lexer accumulates raw text chunks and only recognises
//! `` ` `` and `${`.

use std::str::FromStr;

use serde::Serialize;
use strum::{EnumString, IntoStaticStr};

use crate::error::CodeLoc;

/// Operators, punctuation and reserved words.
///
/// The last six variants are synthetic: the expression parser rewrites
/// `++`/`--`/`+`/`-` into their prefix/postfix forms before precedence
/// reduction, and those forms never come out of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Serialize)]
pub(crate) enum Op {
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = ";")]
    Semicolon,
    #[strum(serialize = ".")]
    Dot,
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "~")]
    BitNot,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "++")]
    Inc,
    #[strum(serialize = "--")]
    Dec,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "+=")]
    PlusAssign,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "-=")]
    MinusAssign,
    #[strum(serialize = "*")]
    Star,
    #[strum(serialize = "*=")]
    StarAssign,
    #[strum(serialize = "**")]
    Pow,
    #[strum(serialize = "**=")]
    PowAssign,
    #[strum(serialize = "/")]
    Slash,
    #[strum(serialize = "/=")]
    SlashAssign,
    #[strum(serialize = "%")]
    Percent,
    #[strum(serialize = "%=")]
    PercentAssign,
    #[strum(serialize = "<<")]
    Shl,
    #[strum(serialize = "<<=")]
    ShlAssign,
    #[strum(serialize = ">>")]
    Shr,
    #[strum(serialize = ">>=")]
    ShrAssign,
    #[strum(serialize = ">>>")]
    UShr,
    #[strum(serialize = ">>>=")]
    UShrAssign,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "&=")]
    BitAndAssign,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "|=")]
    BitOrAssign,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "^=")]
    BitXorAssign,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "&&=")]
    AndAssign,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "||=")]
    OrAssign,
    #[strum(serialize = "??")]
    Nullish,
    #[strum(serialize = "??=")]
    NullishAssign,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "===")]
    StrictEq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "!==")]
    StrictNe,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = "?")]
    Question,
    #[strum(serialize = ":")]
    Colon,
    #[strum(serialize = "?.")]
    OptDot,
    #[strum(serialize = "(")]
    OpenParen,
    #[strum(serialize = ")")]
    CloseParen,
    #[strum(serialize = "?.(")]
    OptParen,
    #[strum(serialize = "[")]
    OpenBracket,
    #[strum(serialize = "]")]
    CloseBracket,
    #[strum(serialize = "?.[")]
    OptBracket,
    #[strum(serialize = "{")]
    OpenBrace,
    #[strum(serialize = "}")]
    CloseBrace,
    #[strum(serialize = "...")]
    Ellipsis,
    #[strum(serialize = "=>")]
    Arrow,
    #[strum(serialize = "`")]
    Backtick,
    #[strum(serialize = "${")]
    DollarBrace,

    // Word operators
    #[strum(serialize = "new")]
    New,
    #[strum(serialize = "delete")]
    Delete,
    #[strum(serialize = "void")]
    Void,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "typeof")]
    TypeOf,
    #[strum(serialize = "instanceof")]
    InstanceOf,
    #[strum(serialize = "true")]
    True,
    #[strum(serialize = "false")]
    False,
    #[strum(serialize = "null")]
    Null,
    #[strum(serialize = "undefined")]
    Undefined,

    // Reserved keywords
    #[strum(serialize = "var")]
    Var,
    #[strum(serialize = "let")]
    Let,
    #[strum(serialize = "const")]
    Const,
    #[strum(serialize = "if")]
    If,
    #[strum(serialize = "else")]
    Else,
    #[strum(serialize = "return")]
    Return,
    #[strum(serialize = "do")]
    Do,
    #[strum(serialize = "while")]
    While,
    #[strum(serialize = "for")]
    For,
    #[strum(serialize = "continue")]
    Continue,
    #[strum(serialize = "switch")]
    Switch,
    #[strum(serialize = "case")]
    Case,
    #[strum(serialize = "break")]
    Break,
    #[strum(serialize = "default")]
    Default,
    #[strum(serialize = "throw")]
    Throw,
    #[strum(serialize = "try")]
    Try,
    #[strum(serialize = "catch")]
    Catch,
    #[strum(serialize = "finally")]
    Finally,
    #[strum(serialize = "await")]
    Await,
    #[strum(serialize = "async")]
    Async,
    #[strum(serialize = "yield")]
    Yield,
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = "import")]
    Import,
    #[strum(serialize = "export")]
    Export,
    #[strum(serialize = "class")]
    Class,
    #[strum(serialize = "package")]
    Package,
    #[strum(serialize = "with")]
    With,
    #[strum(serialize = "this")]
    This,
    #[strum(serialize = "super")]
    Super,
    #[strum(serialize = "extends")]
    Extends,
    #[strum(serialize = "implements")]
    Implements,
    #[strum(serialize = "static")]
    Static,
    #[strum(serialize = "public")]
    Public,
    #[strum(serialize = "private")]
    Private,
    #[strum(serialize = "protected")]
    Protected,
    #[strum(serialize = "interface")]
    Interface,

    // Synthetic forms used by the expression parser
    #[strum(serialize = "x++")]
    PostInc,
    #[strum(serialize = "x--")]
    PostDec,
    #[strum(serialize = "+x")]
    UnaryPlus,
    #[strum(serialize = "-x")]
    UnaryMinus,
    #[strum(serialize = "++x")]
    PreInc,
    #[strum(serialize = "--x")]
    PreDec,
}

impl Op {
    pub fn text(self) -> &'static str {
        self.into()
    }

    /// For word operators (`new`, `default`, ...) the word itself; lets
    /// reserved words serve as property names after `.` and in object
    /// literal keys.
    pub fn identifier_name(self) -> Option<&'static str> {
        let text = self.text();
        text.chars().all(|c| c.is_ascii_alphabetic()).then_some(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) enum Token {
    Eof,
    /// A malformed literal; the parser promotes this to a parse error.
    Error,
    Op(Op),
    Number(f64),
    /// A string literal including its delimiters.
    Str(String),
    /// A raw template chunk (escapes not yet decoded, no delimiters).
    Template(String),
    Ident(String),
}

impl Token {
    pub fn is_op(&self, op: Op) -> bool {
        matches!(self, Self::Op(o) if *o == op)
    }
}

#[derive(Debug, Clone)]
struct Lookahead {
    token: Token,
    loc: CodeLoc,
    newline_before: bool,
    /// Scanner state at the start of this token, for rewinding when the
    /// parser switches template mode with a pending lookahead.
    start: (usize, u32, u32),
}

#[derive(Debug, Clone)]
pub(crate) struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: u32,
    column: u32,
    template_mode: bool,
    lookahead: Option<Lookahead>,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            template_mode: false,
            lookahead: None,
        }
    }

    pub fn peek(&mut self) -> &Token {
        self.fill();
        &self.lookahead.as_ref().expect("lookahead filled").token
    }

    pub fn peek_loc(&mut self) -> CodeLoc {
        self.fill();
        self.lookahead.as_ref().expect("lookahead filled").loc
    }

    /// True when a newline separated the previous token from the next one.
    pub fn peek_eol(&mut self) -> bool {
        self.fill();
        self.lookahead.as_ref().expect("lookahead filled").newline_before
    }

    pub fn read(&mut self) -> (Token, CodeLoc) {
        self.fill();
        let la = self.lookahead.take().expect("lookahead filled");
        (la.token, la.loc)
    }

    /// Consumes the lookahead if it is exactly `op`.
    pub fn read_op(&mut self, op: Op) -> bool {
        if self.peek().is_op(op) {
            self.read();
            true
        } else {
            false
        }
    }

    pub fn set_template_mode(&mut self, on: bool) {
        if self.template_mode == on {
            return;
        }
        // A pending lookahead was produced under the old mode; rewind so it
        // is re-scanned under the new one.
        if let Some(la) = self.lookahead.take() {
            let (pos, line, column) = la.start;
            self.pos = pos;
            self.line = line;
            self.column = column;
        }
        self.template_mode = on;
    }

    fn fill(&mut self) {
        if self.lookahead.is_some() {
            return;
        }
        let newline_before = if self.template_mode { false } else { self.skip_space() };
        let start = (self.pos, self.line, self.column);
        let loc = CodeLoc::new(self.line, self.column);
        let token = if self.template_mode {
            self.scan_template()
        } else {
            self.scan_script()
        };
        self.lookahead = Some(Lookahead {
            token,
            loc,
            newline_before,
            start,
        });
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn cur(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.cur()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Skips whitespace and comments, reporting whether a newline was seen.
    fn skip_space(&mut self) -> bool {
        let mut has_eol = false;
        loop {
            while let Some(c) = self.cur() {
                if !c.is_whitespace() {
                    break;
                }
                if c == '\n' {
                    has_eol = true;
                }
                self.bump();
            }
            if self.rest().starts_with("//") {
                while let Some(c) = self.cur() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                has_eol = true;
                continue;
            }
            if self.rest().starts_with("/*") {
                self.bump();
                self.bump();
                loop {
                    if self.rest().starts_with("*/") {
                        self.bump();
                        self.bump();
                        break;
                    }
                    match self.bump() {
                        Some('\n') => has_eol = true,
                        Some(_) => {}
                        None => break,
                    }
                }
                continue;
            }
            return has_eol;
        }
    }

    fn scan_template(&mut self) -> Token {
        match self.cur() {
            None => Token::Eof,
            Some('`') => {
                self.bump();
                Token::Op(Op::Backtick)
            }
            Some('$') if self.rest().starts_with("${") => {
                self.bump();
                self.bump();
                Token::Op(Op::DollarBrace)
            }
            Some(_) => {
                let mut chunk = String::new();
                loop {
                    match self.cur() {
                        None => return Token::Error,
                        Some('`') => break,
                        Some('$') if self.rest().starts_with("${") => break,
                        Some('\\') => {
                            chunk.push('\\');
                            self.bump();
                            match self.bump() {
                                Some(c) => chunk.push(c),
                                None => return Token::Error,
                            }
                        }
                        Some(c) => {
                            chunk.push(c);
                            self.bump();
                        }
                    }
                }
                Token::Template(chunk)
            }
        }
    }

    fn scan_script(&mut self) -> Token {
        let Some(c) = self.cur() else {
            return Token::Eof;
        };

        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        if is_operator_char(c) {
            let next_is_digit = self
                .rest()
                .chars()
                .nth(1)
                .is_some_and(|d| d.is_ascii_digit());
            if !(c == '.' && next_is_digit) {
                return self.scan_operator();
            }
        }

        if c.is_ascii_digit() || c == '.' {
            return self.scan_number();
        }

        self.scan_word()
    }

    fn scan_string(&mut self, quote: char) -> Token {
        let mut raw = String::new();
        raw.push(quote);
        self.bump();
        loop {
            match self.cur() {
                None => return Token::Error,
                Some(c) if c == quote => {
                    raw.push(c);
                    self.bump();
                    return Token::Str(raw);
                }
                Some('\\') => {
                    raw.push('\\');
                    self.bump();
                    match self.bump() {
                        Some(c) => raw.push(c),
                        None => return Token::Error,
                    }
                }
                Some(c) => {
                    raw.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Longest-match over the operator alphabet: operators are at most
    /// four characters, so try prefixes from longest to shortest.
    fn scan_operator(&mut self) -> Token {
        let rest = self.rest();
        for len in (1..=4).rev() {
            if rest.len() < len || !rest.is_char_boundary(len) {
                continue;
            }
            let prefix = &rest[..len];
            if !prefix.chars().all(is_operator_char) {
                continue;
            }
            if let Ok(op) = Op::from_str(prefix) {
                for _ in 0..len {
                    self.bump();
                }
                return Token::Op(op);
            }
        }
        Token::Error
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        let rest = self.rest();

        // Radix-prefixed integer literals.
        if let Some(radix_rest) = rest
            .strip_prefix("0x")
            .or_else(|| rest.strip_prefix("0X"))
            .map(|r| (16, r))
            .or_else(|| rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")).map(|r| (8, r)))
            .or_else(|| rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")).map(|r| (2, r)))
        {
            let (radix, digits_str) = radix_rest;
            let digits: String = digits_str.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
            if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                return Token::Error;
            }
            self.bump();
            self.bump();
            for _ in 0..digits.len() {
                self.bump();
            }
            if self.terminates_number() {
                let n = u64::from_str_radix(&digits, radix).map(|v| v as f64);
                return n.map_or(Token::Error, Token::Number);
            }
            return Token::Error;
        }

        // Decimal: digits [. digits] [e[+-]digits], or leading '.'.
        while self.cur().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.cur() == Some('.') {
            self.bump();
            while self.cur().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.cur(), Some('e' | 'E')) {
            let exp_mark = (self.pos, self.line, self.column);
            self.bump();
            if matches!(self.cur(), Some('+' | '-')) {
                self.bump();
            }
            if self.cur().is_some_and(|c| c.is_ascii_digit()) {
                while self.cur().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            } else {
                // Not an exponent after all; an identifier char follows a
                // number, which is malformed either way.
                (self.pos, self.line, self.column) = exp_mark;
                return Token::Error;
            }
        }
        if !self.terminates_number() {
            return Token::Error;
        }
        self.src[start..self.pos].parse().map_or(Token::Error, Token::Number)
    }

    fn terminates_number(&self) -> bool {
        match self.cur() {
            None => true,
            Some(c) => c.is_whitespace() || (is_operator_char(c) && c != '.'),
        }
    }

    fn scan_word(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.cur() {
            if c.is_whitespace() || is_operator_char(c) || c == '"' || c == '\'' {
                break;
            }
            self.bump();
        }
        let word = &self.src[start..self.pos];
        if word.is_empty() {
            return Token::Error;
        }
        match Op::from_str(word) {
            Ok(op) => Token::Op(op),
            Err(_) => Token::Ident(word.to_owned()),
        }
    }
}

/// Characters that can start or continue a punctuation operator. `_` and
/// `$` are identifier characters.
fn is_operator_char(c: char) -> bool {
    c != '_' && c != '$' && c.is_ascii_punctuation()
}

/// Decodes a quoted string literal (delimiters included) into its value.
///
/// Handles the C escapes, `\xHH`, `\uHHHH`, `\u{...}` and up-to-three-digit
/// octal escapes. Escaped UTF-16 surrogate pairs combine into one code
/// point; a lone surrogate decodes to U+FFFD.
pub(crate) fn decode_string(raw: &str) -> Result<String, &'static str> {
    let mut chars = raw.chars();
    let quote = chars.next().ok_or("unexpected end of string")?;
    let mut units: Vec<u32> = Vec::with_capacity(raw.len());

    let mut push_code_point = |units: &mut Vec<u32>, c: u32| {
        if c >= 0x10000 {
            let c = c - 0x10000;
            units.push(0xd800 + ((c >> 10) & 0x3ff));
            units.push(0xdc00 + (c & 0x3ff));
        } else {
            units.push(c);
        }
    };

    loop {
        let Some(c) = chars.next() else {
            return Err("unexpected end of string");
        };
        if c == quote {
            break;
        }
        if c != '\\' {
            push_code_point(&mut units, c as u32);
            continue;
        }
        let Some(esc) = chars.next() else {
            return Err("unexpected end of string");
        };
        match esc {
            'b' => units.push(0x08),
            'f' => units.push(0x0c),
            'n' => units.push(0x0a),
            'r' => units.push(0x0d),
            't' => units.push(0x09),
            'v' => units.push(0x0b),
            'x' => {
                let h = hex_digit(chars.next())?;
                let l = hex_digit(chars.next())?;
                units.push((h << 4) | l);
            }
            'u' => {
                let mut peek = chars.clone();
                if peek.next() == Some('{') {
                    chars.next();
                    let mut value: u32 = 0;
                    let mut closed = false;
                    for _ in 0..=5 {
                        match chars.next() {
                            Some('}') => {
                                closed = true;
                                break;
                            }
                            c => value = (value << 4) | hex_digit(c)?,
                        }
                    }
                    if !closed && chars.next() != Some('}') {
                        return Err("unexpected end of code point");
                    }
                    push_code_point(&mut units, value);
                } else {
                    let mut value: u32 = 0;
                    for _ in 0..4 {
                        value = (value << 4) | hex_digit(chars.next())?;
                    }
                    units.push(value);
                }
            }
            '0'..='7' => {
                let mut value = esc as u32 - '0' as u32;
                for _ in 0..2 {
                    let mut peek = chars.clone();
                    match peek.next() {
                        Some(c @ '0'..='7') if (value << 3) + (c as u32 - '0' as u32) <= 0o377 => {
                            value = (value << 3) + (c as u32 - '0' as u32);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                units.push(value);
            }
            other => push_code_point(&mut units, other as u32),
        }
    }

    // Recombine surrogate pairs produced by \uXXXX escapes.
    let mut out = String::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        let u = units[i];
        let c = if (0xd800..0xdc00).contains(&u) {
            match units.get(i + 1) {
                Some(&low) if (0xdc00..0xe000).contains(&low) => {
                    i += 1;
                    0x10000 + (((u - 0xd800) << 10) | (low - 0xdc00))
                }
                _ => 0xfffd,
            }
        } else if (0xdc00..0xe000).contains(&u) {
            0xfffd
        } else {
            u
        };
        out.push(char::from_u32(c).unwrap_or('\u{fffd}'));
        i += 1;
    }
    Ok(out)
}

fn hex_digit(c: Option<char>) -> Result<u32, &'static str> {
    c.and_then(|c| c.to_digit(16)).ok_or("invalid hexadecimal character")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let (t, _) = lexer.read();
            let done = matches!(t, Token::Eof | Token::Error);
            out.push(t);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn longest_match_operators() {
        assert_eq!(
            tokens("a >>>= b >>> c >> d > e"),
            vec![
                Token::Ident("a".into()),
                Token::Op(Op::UShrAssign),
                Token::Ident("b".into()),
                Token::Op(Op::UShr),
                Token::Ident("c".into()),
                Token::Op(Op::Shr),
                Token::Ident("d".into()),
                Token::Op(Op::Gt),
                Token::Ident("e".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn optional_chain_operators() {
        assert_eq!(
            tokens("a?.b?.[0]?.()"),
            vec![
                Token::Ident("a".into()),
                Token::Op(Op::OptDot),
                Token::Ident("b".into()),
                Token::Op(Op::OptBracket),
                Token::Number(0.0),
                Token::Op(Op::CloseBracket),
                Token::Op(Op::OptParen),
                Token::Op(Op::CloseParen),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(tokens("42"), vec![Token::Number(42.0), Token::Eof]);
        assert_eq!(tokens("3.25"), vec![Token::Number(3.25), Token::Eof]);
        assert_eq!(tokens(".5"), vec![Token::Number(0.5), Token::Eof]);
        assert_eq!(tokens("1e3"), vec![Token::Number(1000.0), Token::Eof]);
        assert_eq!(tokens("2.5e-1"), vec![Token::Number(0.25), Token::Eof]);
        assert_eq!(tokens("0xff"), vec![Token::Number(255.0), Token::Eof]);
        assert_eq!(tokens("0o17"), vec![Token::Number(15.0), Token::Eof]);
        assert_eq!(tokens("0b101"), vec![Token::Number(5.0), Token::Eof]);
    }

    #[test]
    fn malformed_number_is_an_error_token() {
        assert!(tokens("0x").contains(&Token::Error));
        assert!(tokens("1q").contains(&Token::Error));
        assert!(tokens("0b2").contains(&Token::Error));
    }

    #[test]
    fn strings_keep_their_delimiters() {
        assert_eq!(tokens("'ab'"), vec![Token::Str("'ab'".into()), Token::Eof]);
        assert_eq!(tokens("\"a\\\"b\""), vec![Token::Str("\"a\\\"b\"".into()), Token::Eof]);
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            tokens("var x = new y"),
            vec![
                Token::Op(Op::Var),
                Token::Ident("x".into()),
                Token::Op(Op::Assign),
                Token::Op(Op::New),
                Token::Ident("y".into()),
                Token::Eof,
            ]
        );
        // `$` and `_` are identifier characters.
        assert_eq!(
            tokens("$fiber _x"),
            vec![Token::Ident("$fiber".into()), Token::Ident("_x".into()), Token::Eof]
        );
    }

    #[test]
    fn comments_and_newline_tracking() {
        let mut lexer = Lexer::new("a // comment\nb /* c */ d");
        assert_eq!(lexer.read().0, Token::Ident("a".into()));
        assert!(lexer.peek_eol());
        assert_eq!(lexer.read().0, Token::Ident("b".into()));
        assert!(!lexer.peek_eol());
        assert_eq!(lexer.read().0, Token::Ident("d".into()));
    }

    #[test]
    fn line_and_column_positions() {
        let mut lexer = Lexer::new("a\n  b");
        let (_, loc) = lexer.read();
        assert_eq!((loc.line, loc.column), (1, 1));
        let (_, loc) = lexer.read();
        assert_eq!((loc.line, loc.column), (2, 3));
    }

    #[test]
    fn template_mode_chunks() {
        let mut lexer = Lexer::new("`ab${x}c`");
        assert_eq!(lexer.read().0, Token::Op(Op::Backtick));
        lexer.set_template_mode(true);
        assert_eq!(lexer.read().0, Token::Template("ab".into()));
        assert_eq!(lexer.read().0, Token::Op(Op::DollarBrace));
        lexer.set_template_mode(false);
        assert_eq!(lexer.read().0, Token::Ident("x".into()));
        assert_eq!(lexer.read().0, Token::Op(Op::CloseBrace));
        lexer.set_template_mode(true);
        assert_eq!(lexer.read().0, Token::Template("c".into()));
        assert_eq!(lexer.read().0, Token::Op(Op::Backtick));
    }

    #[test]
    fn retokenizing_spaced_output_preserves_the_stream() {
        // Render every token back to text with single spaces between them;
        // the re-tokenised stream must match the original.
        let src = "var x = 1.5 + foo(bar, 'a\\nb') >>> 2; if (x >= 0b10) x ??= y.z;";
        let first = tokens(src);
        let spaced: Vec<String> = first
            .iter()
            .filter_map(|t| match t {
                Token::Op(op) => Some(op.text().to_owned()),
                Token::Number(n) => Some(format!("{n}")),
                Token::Str(raw) => Some(raw.clone()),
                Token::Ident(name) => Some(name.clone()),
                Token::Eof | Token::Error | Token::Template(_) => None,
            })
            .collect();
        let second = tokens(&spaced.join(" "));
        assert_eq!(first, second);
    }

    #[test]
    fn escape_decoding() {
        assert_eq!(decode_string("'a\\nb'").unwrap(), "a\nb");
        assert_eq!(decode_string("'\\x41'").unwrap(), "A");
        assert_eq!(decode_string("'\\u0041'").unwrap(), "A");
        assert_eq!(decode_string("'\\u{1F600}'").unwrap(), "\u{1F600}");
        assert_eq!(decode_string("'\\ud83d\\ude00'").unwrap(), "\u{1F600}");
        assert_eq!(decode_string("'\\101'").unwrap(), "A");
        assert_eq!(decode_string("'\\q'").unwrap(), "q");
        assert!(decode_string("'abc").is_err());
        assert!(decode_string("'\\xg1'").is_err());
    }
}
