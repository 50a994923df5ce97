//! JSONata tokenizer (spec §4.1).
//!
//! Unlike a whole-string-to-`Vec<Token>` tokenizer, this one is driven
//! token-by-token by the parser: `/` is ambiguous between division and a
//! regex literal, and the correct reading depends on whether the parser
//! is in a value (prefix) or operator (infix) position at that point in
//! the grammar. The parser therefore calls `Lexer::scan(expect_operand)`
//! rather than consuming a pre-built token stream.

use crate::error::{err, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Name(String),
    Variable(String),
    Regex(String, String),

    True,
    False,
    Null,
    And,
    Or,
    In,
    /// `function` keyword introducing a lambda.
    Function,

    Dot,
    Comma,
    Semicolon,
    Colon,
    /// `?` — ternary / partial-application placeholder.
    Question,
    /// `?:` Elvis.
    Elvis,
    /// `??` coalesce.
    Coalesce,
    LParen,
    RParen,
    LBrack,
    RBrack,
    LBrace,
    RBrace,

    Plus,
    Minus,
    Star,
    /// `**` — descendant wildcard.
    StarStar,
    Slash,
    /// `%` — arithmetic modulo in infix position, parent reference in
    /// prefix/value position. The lexer only ever produces this one
    /// token kind; the parser disambiguates by position.
    Percent,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `&` string concatenation.
    Amp,
    /// `|` transform triad delimiter.
    Pipe,

    /// `~>` function chain.
    Chain,
    /// `..` range.
    DotDot,
    /// `:=` assignment.
    Assign,
    /// `@` focus binding.
    At,
    /// `#` index binding.
    Hash,
    /// `^` sort.
    Caret,

    Eof,
}

/// A scanned token paired with the byte offset it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos + 1 < self.bytes.len()
                && self.bytes[self.pos] == b'/'
                && self.bytes[self.pos + 1] == b'*'
            {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos + 1 >= self.bytes.len() {
                        return Err(err::s0201(start, "/*"));
                    }
                    if self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
        Ok(())
    }

    /// Scan the next token. `expect_operand` must be `true` whenever the
    /// parser is about to call a prefix/value rule — this is what lets a
    /// leading `/` be read as a regex literal rather than the division
    /// operator.
    pub fn scan(&mut self, expect_operand: bool) -> Result<Spanned> {
        self.skip_trivia()?;
        let start = self.pos;
        if self.pos >= self.bytes.len() {
            return Ok(Spanned {
                token: Token::Eof,
                pos: start,
            });
        }

        let c = self.bytes[self.pos];

        if expect_operand && c == b'/' {
            return self.scan_regex(start);
        }

        macro_rules! two {
            ($a:expr, $b:expr, $tok:expr) => {
                if self.pos + 1 < self.bytes.len()
                    && self.bytes[self.pos] == $a
                    && self.bytes[self.pos + 1] == $b
                {
                    self.pos += 2;
                    return Ok(Spanned {
                        token: $tok,
                        pos: start,
                    });
                }
            };
        }

        two!(b':', b'=', Token::Assign);
        two!(b'~', b'>', Token::Chain);
        two!(b'.', b'.', Token::DotDot);
        two!(b'*', b'*', Token::StarStar);
        two!(b'?', b':', Token::Elvis);
        two!(b'?', b'?', Token::Coalesce);
        two!(b'=', b'=', Token::Eq);
        two!(b'!', b'=', Token::Ne);
        two!(b'<', b'=', Token::Le);
        two!(b'>', b'=', Token::Ge);

        let single = match c {
            b'.' => Some(Token::Dot),
            b',' => Some(Token::Comma),
            b';' => Some(Token::Semicolon),
            b':' => Some(Token::Colon),
            b'?' => Some(Token::Question),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBrack),
            b']' => Some(Token::RBrack),
            b'{' => Some(Token::LBrace),
            b'}' => Some(Token::RBrace),
            b'+' => Some(Token::Plus),
            b'-' => Some(Token::Minus),
            b'*' => Some(Token::Star),
            b'/' => Some(Token::Slash),
            b'%' => Some(Token::Percent),
            b'=' => Some(Token::Eq),
            b'!' => None, // lone '!' is not valid; handled below
            b'<' => Some(Token::Lt),
            b'>' => Some(Token::Gt),
            b'&' => Some(Token::Amp),
            b'|' => Some(Token::Pipe),
            b'~' => None,
            b'@' => Some(Token::At),
            b'#' => Some(Token::Hash),
            b'^' => Some(Token::Caret),
            _ => None,
        };
        if let Some(tok) = single {
            self.pos += 1;
            return Ok(Spanned { token: tok, pos: start });
        }

        if c == b'"' || c == b'\'' {
            return self.scan_string(start, c);
        }
        if c == b'`' {
            return self.scan_backtick_name(start);
        }
        if c == b'$' {
            return self.scan_variable(start);
        }
        if c.is_ascii_digit() {
            return self.scan_number(start);
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return self.scan_name(start);
        }

        Err(err::s0201(start, (c as char).to_string()))
    }

    fn scan_variable(&mut self, start: usize) -> Result<Spanned> {
        self.pos += 1; // consume '$'
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'$' {
            self.pos += 1;
            return Ok(Spanned {
                token: Token::Variable("$".to_string()),
                pos: start,
            });
        }
        let name_start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let name = self.src[name_start..self.pos].to_string();
        Ok(Spanned {
            token: Token::Variable(name),
            pos: start,
        })
    }

    fn scan_name(&mut self, start: usize) -> Result<Spanned> {
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        let token = match word {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "and" => Token::And,
            "or" => Token::Or,
            "in" => Token::In,
            "function" => Token::Function,
            other => Token::Name(other.to_string()),
        };
        Ok(Spanned { token, pos: start })
    }

    fn scan_backtick_name(&mut self, start: usize) -> Result<Spanned> {
        self.pos += 1; // consume opening backtick
        let name_start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'`' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(err::s0105(start));
        }
        let name = self.src[name_start..self.pos].to_string();
        self.pos += 1; // consume closing backtick
        Ok(Spanned {
            token: Token::Name(name),
            pos: start,
        })
    }

    fn scan_string(&mut self, start: usize, quote: u8) -> Result<Spanned> {
        self.pos += 1;
        let mut s = String::new();
        loop {
            if self.pos >= self.bytes.len() {
                return Err(err::s0101(start));
            }
            let b = self.bytes[self.pos];
            if b == quote {
                self.pos += 1;
                break;
            }
            if b == b'\\' {
                self.pos += 1;
                if self.pos >= self.bytes.len() {
                    return Err(err::s0101(start));
                }
                match self.bytes[self.pos] {
                    b'"' => {
                        s.push('"');
                        self.pos += 1;
                    }
                    b'\'' => {
                        s.push('\'');
                        self.pos += 1;
                    }
                    b'\\' => {
                        s.push('\\');
                        self.pos += 1;
                    }
                    b'/' => {
                        s.push('/');
                        self.pos += 1;
                    }
                    b'n' => {
                        s.push('\n');
                        self.pos += 1;
                    }
                    b'r' => {
                        s.push('\r');
                        self.pos += 1;
                    }
                    b't' => {
                        s.push('\t');
                        self.pos += 1;
                    }
                    b'b' => {
                        s.push('\u{8}');
                        self.pos += 1;
                    }
                    b'f' => {
                        s.push('\u{c}');
                        self.pos += 1;
                    }
                    b'u' => {
                        self.pos += 1;
                        if self.pos + 4 > self.bytes.len() {
                            return Err(err::s0103(start, 'u'));
                        }
                        let hex = &self.src[self.pos..self.pos + 4];
                        let cp = u32::from_str_radix(hex, 16)
                            .map_err(|_| err::s0103(start, 'u'))?;
                        if let Some(ch) = char::from_u32(cp) {
                            s.push(ch);
                        }
                        self.pos += 4;
                    }
                    other => return Err(err::s0103(start, other as char)),
                }
                continue;
            }
            // Fast path: copy verbatim up to the next special byte.
            let chunk_start = self.pos;
            while self.pos < self.bytes.len()
                && self.bytes[self.pos] != quote
                && self.bytes[self.pos] != b'\\'
            {
                self.pos += 1;
            }
            s.push_str(&self.src[chunk_start..self.pos]);
        }
        Ok(Spanned {
            token: Token::Str(s),
            pos: start,
        })
    }

    fn scan_number(&mut self, start: usize) -> Result<Spanned> {
        let mut i = self.pos;
        while i < self.bytes.len() && self.bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i < self.bytes.len() && self.bytes[i] == b'.' && i + 1 < self.bytes.len()
            && self.bytes[i + 1].is_ascii_digit()
        {
            i += 1;
            while i < self.bytes.len() && self.bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i < self.bytes.len() && (self.bytes[i] == b'e' || self.bytes[i] == b'E') {
            let mut j = i + 1;
            if j < self.bytes.len() && (self.bytes[j] == b'+' || self.bytes[j] == b'-') {
                j += 1;
            }
            if j < self.bytes.len() && self.bytes[j].is_ascii_digit() {
                i = j;
                while i < self.bytes.len() && self.bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }
        let text = &self.src[start..i];
        let n: f64 = text.parse().map_err(|_| err::s0102(start))?;
        if !n.is_finite() {
            return Err(err::s0102(start));
        }
        self.pos = i;
        Ok(Spanned {
            token: Token::Number(n),
            pos: start,
        })
    }

    /// Re-scan starting at a `/` the parser has decided is a regex
    /// literal rather than division.
    fn scan_regex(&mut self, start: usize) -> Result<Spanned> {
        self.pos += 1; // consume opening '/'
        let pat_start = self.pos;
        let mut in_class = false;
        loop {
            if self.pos >= self.bytes.len() {
                return Err(err::s0302(start));
            }
            match self.bytes[self.pos] {
                b'\\' => {
                    self.pos += 2;
                }
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => break,
                b'\n' => return Err(err::s0302(start)),
                _ => self.pos += 1,
            }
        }
        let pattern = self.src[pat_start..self.pos].to_string();
        self.pos += 1; // consume closing '/'
        let flags_start = self.pos;
        while self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b'i' | b'm' | b's' | b'g')
        {
            self.pos += 1;
        }
        let flags = self.src[flags_start..self.pos].to_string();
        if pattern.is_empty() {
            return Err(err::s0301(start));
        }
        Ok(Spanned {
            token: Token::Regex(pattern, flags),
            pos: start,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Rewind to a position previously obtained from `pos()`. Used by the
    /// parser to implement a non-consuming one-token lookahead.
    pub fn reset_pos(&mut self, pos: usize) {
        self.pos = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str, expect_operand_seq: &[bool]) -> Vec<Token> {
        let mut lex = Lexer::new(src);
        expect_operand_seq
            .iter()
            .map(|eo| lex.scan(*eo).unwrap().token)
            .collect()
    }

    #[test]
    fn scans_field_path() {
        assert_eq!(
            toks("A.O.P", &[true, false, true, false, true]),
            vec![
                Token::Name("A".into()),
                Token::Dot,
                Token::Name("O".into()),
                Token::Dot,
                Token::Name("P".into()),
            ]
        );
    }

    #[test]
    fn scans_variables() {
        let mut lex = Lexer::new("$foo");
        assert_eq!(lex.scan(true).unwrap().token, Token::Variable("foo".into()));
        let mut lex2 = Lexer::new("$");
        assert_eq!(lex2.scan(true).unwrap().token, Token::Variable("".into()));
        let mut lex3 = Lexer::new("$$");
        assert_eq!(lex3.scan(true).unwrap().token, Token::Variable("$".into()));
    }

    #[test]
    fn scans_string_escapes() {
        let mut lex = Lexer::new(r#""a\nbA""#);
        assert_eq!(
            lex.scan(true).unwrap().token,
            Token::Str("a\nbA".to_string())
        );
    }

    #[test]
    fn unterminated_string_is_s0101() {
        let mut lex = Lexer::new("\"abc");
        let err = lex.scan(true).unwrap_err();
        assert_eq!(err.code, "S0101");
    }

    #[test]
    fn backtick_name() {
        let mut lex = Lexer::new("`a weird name`");
        assert_eq!(
            lex.scan(true).unwrap().token,
            Token::Name("a weird name".into())
        );
    }

    #[test]
    fn unterminated_backtick_is_s0105() {
        let mut lex = Lexer::new("`oops");
        let err = lex.scan(true).unwrap_err();
        assert_eq!(err.code, "S0105");
    }

    #[test]
    fn numbers() {
        let mut lex = Lexer::new("3.14");
        assert_eq!(lex.scan(true).unwrap().token, Token::Number(3.14));
        let mut lex2 = Lexer::new("42");
        assert_eq!(lex2.scan(true).unwrap().token, Token::Number(42.0));
        let mut lex3 = Lexer::new("1e3");
        assert_eq!(lex3.scan(true).unwrap().token, Token::Number(1000.0));
    }

    #[test]
    fn regex_scanned_on_demand() {
        let mut lex = Lexer::new("/ab\\/c/im");
        let spanned = lex.scan(true).unwrap();
        assert_eq!(spanned.token, Token::Regex("ab\\/c".into(), "im".into()));
    }

    #[test]
    fn slash_is_division_when_operand_not_expected() {
        let mut lex = Lexer::new("/ 2");
        assert_eq!(lex.scan(false).unwrap().token, Token::Slash);
    }

    #[test]
    fn two_char_operators() {
        for (src, tok) in [
            (":=", Token::Assign),
            ("~>", Token::Chain),
            ("..", Token::DotDot),
            ("**", Token::StarStar),
            ("?:", Token::Elvis),
            ("??", Token::Coalesce),
            ("!=", Token::Ne),
            ("<=", Token::Le),
            (">=", Token::Ge),
        ] {
            let mut lex = Lexer::new(src);
            assert_eq!(lex.scan(false).unwrap().token, tok, "for {src}");
        }
    }

    #[test]
    fn block_comment_is_skipped() {
        let mut lex = Lexer::new("/* comment */ foo");
        assert_eq!(lex.scan(true).unwrap().token, Token::Name("foo".into()));
    }

    #[test]
    fn keywords() {
        assert_eq!(toks("true", &[true]), vec![Token::True]);
        assert_eq!(toks("false", &[true]), vec![Token::False]);
        assert_eq!(toks("null", &[true]), vec![Token::Null]);
        assert_eq!(toks("and", &[true]), vec![Token::And]);
        assert_eq!(toks("or", &[true]), vec![Token::Or]);
        assert_eq!(toks("in", &[true]), vec![Token::In]);
    }

    #[test]
    fn percent_is_a_single_token_kind_regardless_of_position() {
        let mut lex = Lexer::new("%");
        assert_eq!(lex.scan(true).unwrap().token, Token::Percent);
        let mut lex2 = Lexer::new("%");
        assert_eq!(lex2.scan(false).unwrap().token, Token::Percent);
    }
}
