use std::path::Path;

use crate::db::dialect::{Dialect, PLSQL_LOOKAHEAD_WORDS};
use crate::error::{Result, ScriptError};

use super::reader::read_script;
use super::ParseResult;

/// Lexical mode of the scanner at the current character.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum LexMode {
    #[default]
    Normal,
    LineComment,
    BlockComment {
        depth: usize,
    },
    SingleQuoted,
    DoubleQuoted,
    /// `$tag$ ... $tag$`; holds the full delimiter including both `$`.
    DollarQuoted {
        tag: String,
    },
    /// Oracle `q'[ ... ]'`; holds the closing delimiter.
    QQuoted {
        close: char,
    },
    /// MySQL `` `name` `` or SQL Server `[name]`.
    IdentQuoted {
        close: char,
    },
}

#[derive(Default)]
struct SplitState {
    mode: LexMode,
    token: String,
    /// Words seen so far while the statement is still unclassified.
    leading_words: usize,
    classified: bool,
    procedural: bool,
    block_depth: usize,
    pending_begin: bool,
    pending_end: bool,
    /// Stack recording the block_depth at which each CASE keyword was opened.
    /// A plain END at the same depth closes the CASE expression, not a block.
    case_depth_stack: Vec<usize>,
    /// A comment was dropped between two characters of the buffer.
    needs_gap: bool,
}

impl SplitState {
    fn is_idle(&self) -> bool {
        self.mode == LexMode::Normal
    }

    fn is_unterminated_literal(&self) -> bool {
        matches!(
            self.mode,
            LexMode::BlockComment { .. }
                | LexMode::SingleQuoted
                | LexMode::DoubleQuoted
                | LexMode::DollarQuoted { .. }
                | LexMode::QQuoted { .. }
                | LexMode::IdentQuoted { .. }
        )
    }

    /// Feed one keyword of a procedural statement into the BEGIN/END tracker.
    fn track_block_keyword(&mut self, upper: &str) {
        if self.pending_begin {
            self.pending_begin = false;
            // BEGIN TRANSACTION and friends start a transaction, not a block
            if !matches!(upper, "TRAN" | "TRANSACTION" | "DISTRIBUTED" | "WORK") {
                self.block_depth += 1;
            }
        }

        if self.pending_end {
            self.pending_end = false;
            match upper {
                "IF" | "LOOP" | "WHILE" | "REPEAT" => return,
                "CASE" => {
                    // END CASE of a PL/SQL CASE statement
                    self.case_depth_stack.pop();
                    return;
                }
                _ => self.close_block(),
            }
        }

        match upper {
            "BEGIN" => self.pending_begin = true,
            "END" => self.pending_end = true,
            "CASE" => self.case_depth_stack.push(self.block_depth),
            _ => {}
        }
    }

    fn close_block(&mut self) {
        if self
            .case_depth_stack
            .last()
            .is_some_and(|depth| *depth == self.block_depth)
        {
            self.case_depth_stack.pop();
        } else {
            self.block_depth = self.block_depth.saturating_sub(1);
        }
    }

    /// Resolve a dangling BEGIN/END when a terminator or end of input follows it.
    fn resolve_pending(&mut self) {
        // "BEGIN;" is a transaction start
        self.pending_begin = false;
        if self.pending_end {
            self.pending_end = false;
            self.close_block();
        }
    }

    fn reset_statement_state(&mut self) {
        self.token.clear();
        self.leading_words = 0;
        self.classified = false;
        self.procedural = false;
        self.block_depth = 0;
        self.pending_begin = false;
        self.pending_end = false;
        self.case_depth_stack.clear();
        self.needs_gap = false;
    }
}

struct StatementBuilder {
    dialect: Dialect,
    state: SplitState,
    current: String,
    statements: ParseResult,
}

impl StatementBuilder {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: SplitState::default(),
            current: String::new(),
            statements: ParseResult::new(),
        }
    }

    fn current_is_empty(&self) -> bool {
        self.current.trim().is_empty()
    }

    fn is_slash_line(&self, line: &str) -> bool {
        self.dialect.uses_slash_block_terminator() && self.state.is_idle() && line.trim() == "/"
    }

    fn flush_token(&mut self) {
        if self.state.token.is_empty() {
            return;
        }
        let upper = self.state.token.to_uppercase();
        self.state.token.clear();

        if !self.state.classified {
            self.state.leading_words += 1;
            if self.dialect.is_plsql_start(&self.current) {
                self.state.procedural = true;
                self.state.classified = true;
            } else if self.state.leading_words >= PLSQL_LOOKAHEAD_WORDS {
                self.state.classified = true;
            }
        }

        if self.state.procedural {
            self.state.track_block_keyword(&upper);
        }
    }

    fn push_char(&mut self, c: char) {
        if self.state.needs_gap {
            self.state.needs_gap = false;
            let joins_words = self
                .current
                .chars()
                .last()
                .is_some_and(|last| !last.is_whitespace())
                && !c.is_whitespace();
            if joins_words {
                self.current.push(' ');
            }
        }
        self.current.push(c);
    }

    fn process_line(&mut self, line: &str) {
        if self.is_slash_line(line) {
            self.flush_token();
            self.state.resolve_pending();
            if self.state.block_depth == 0 {
                self.emit();
                return;
            }
        }
        self.process_text(line);
    }

    fn process_text(&mut self, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let backslash = self.dialect.supports_backslash_escapes();
        let mut i = 0usize;

        while i < len {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            match &mut self.state.mode {
                LexMode::LineComment => {
                    if c == '\n' {
                        self.state.mode = LexMode::Normal;
                        self.state.needs_gap = true;
                    }
                    i += 1;
                    continue;
                }
                LexMode::BlockComment { depth } => {
                    if c == '/' && next == Some('*') {
                        *depth += 1;
                        i += 2;
                        continue;
                    }
                    if c == '*' && next == Some('/') {
                        *depth -= 1;
                        if *depth == 0 {
                            self.state.mode = LexMode::Normal;
                            self.state.needs_gap = true;
                        }
                        i += 2;
                        continue;
                    }
                    i += 1;
                    continue;
                }
                LexMode::SingleQuoted => {
                    i = self.scan_quoted(&chars, i, '\'', backslash);
                    continue;
                }
                LexMode::DoubleQuoted => {
                    i = self.scan_quoted(&chars, i, '"', backslash);
                    continue;
                }
                LexMode::IdentQuoted { close } => {
                    let close = *close;
                    i = self.scan_quoted(&chars, i, close, false);
                    continue;
                }
                LexMode::DollarQuoted { tag } => {
                    if c == '$' && starts_with_at(&chars, i, tag) {
                        let tag_len = tag.chars().count();
                        self.current.push_str(tag);
                        self.state.mode = LexMode::Normal;
                        i += tag_len;
                        continue;
                    }
                    self.current.push(c);
                    i += 1;
                    continue;
                }
                LexMode::QQuoted { close } => {
                    let close = *close;
                    self.current.push(c);
                    if c == close && next == Some('\'') {
                        self.current.push('\'');
                        self.state.mode = LexMode::Normal;
                        i += 2;
                        continue;
                    }
                    i += 1;
                    continue;
                }
                LexMode::Normal => {}
            }

            if c == '-' && next == Some('-') {
                self.flush_token();
                self.state.mode = LexMode::LineComment;
                i += 2;
                continue;
            }

            if c == '/' && next == Some('*') {
                self.flush_token();
                self.state.mode = LexMode::BlockComment { depth: 1 };
                i += 2;
                continue;
            }

            if c == '/' && self.closes_block_inline(&chars, i) {
                self.emit();
                break;
            }

            if self.dialect.supports_q_quotes() && self.state.token.is_empty() {
                if let Some(prefix_len) = q_quote_prefix_len(&chars, i) {
                    if let Some(&delimiter) = chars.get(i + prefix_len) {
                        for &p in &chars[i..i + prefix_len] {
                            self.push_char(p);
                        }
                        self.current.push(delimiter);
                        self.state.mode = LexMode::QQuoted {
                            close: q_quote_close(delimiter),
                        };
                        i += prefix_len + 1;
                        continue;
                    }
                }
            }

            if c == '\'' {
                self.flush_token();
                self.state.mode = LexMode::SingleQuoted;
                self.push_char(c);
                i += 1;
                continue;
            }

            if c == '"' {
                self.flush_token();
                self.state.mode = LexMode::DoubleQuoted;
                self.push_char(c);
                i += 1;
                continue;
            }

            if let Some((open, close)) = self.dialect.identifier_quotes() {
                if c == open {
                    self.flush_token();
                    self.state.mode = LexMode::IdentQuoted { close };
                    self.push_char(c);
                    i += 1;
                    continue;
                }
            }

            if c == '$' && self.dialect.supports_dollar_quotes() && self.state.token.is_empty() {
                if let Some(tag) = dollar_tag_at(&chars, i) {
                    let tag_len = tag.chars().count();
                    self.push_char('$');
                    self.current.push_str(&tag[1..]);
                    self.state.mode = LexMode::DollarQuoted { tag };
                    i += tag_len;
                    continue;
                }
            }

            if c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#' {
                self.state.token.push(c);
                self.push_char(c);
                i += 1;
                continue;
            }

            self.flush_token();

            if c == ';' {
                self.on_semicolon();
                i += 1;
                continue;
            }

            self.push_char(c);
            i += 1;
        }
    }

    /// Consume one character inside a quoted literal or identifier and
    /// return the index of the next one. A doubled `quote` is an escape.
    fn scan_quoted(&mut self, chars: &[char], i: usize, quote: char, backslash: bool) -> usize {
        let c = chars[i];
        self.current.push(c);
        if backslash && c == '\\' {
            if let Some(&escaped) = chars.get(i + 1) {
                self.current.push(escaped);
                return i + 2;
            }
            return i + 1;
        }
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                self.current.push(quote);
                return i + 2;
            }
            self.state.mode = LexMode::Normal;
        }
        i + 1
    }

    /// `END; /` on one line: a closed procedural statement followed by a
    /// trailing slash.
    fn closes_block_inline(&self, chars: &[char], i: usize) -> bool {
        self.dialect.uses_slash_block_terminator()
            && self.state.procedural
            && self.state.block_depth == 0
            && self.current.trim_end().ends_with(';')
            && chars[i + 1..].iter().all(|c| c.is_whitespace())
    }

    fn on_semicolon(&mut self) {
        self.state.resolve_pending();

        let terminates = if self.state.procedural {
            !self.dialect.uses_slash_block_terminator() && self.state.block_depth == 0
        } else {
            true
        };

        if !terminates {
            self.push_char(';');
            return;
        }

        if self.current_is_empty() {
            // stray ";;" or a terminator after comments only
            self.current.clear();
            self.state.reset_statement_state();
            return;
        }

        self.push_char(';');
        self.emit();
    }

    fn emit(&mut self) {
        let trimmed = self.current.trim();
        if !trimmed.is_empty() {
            self.statements.push(trimmed.to_string());
        }
        self.current.clear();
        self.state.reset_statement_state();
    }

    fn finalize(mut self) -> ParseResult {
        self.flush_token();
        if self.state.is_unterminated_literal() {
            if !self.current_is_empty() || matches!(self.state.mode, LexMode::BlockComment { .. }) {
                tracing::debug!(
                    mode = ?self.state.mode,
                    "Discarding unterminated trailing fragment"
                );
            }
            self.current.clear();
        } else {
            self.state.resolve_pending();
            self.emit();
        }
        self.statements
    }
}

/// Length of a `q'` or `nq'` prefix starting at `start`, if any.
fn q_quote_prefix_len(chars: &[char], start: usize) -> Option<usize> {
    let is_q = |idx: usize| matches!(chars.get(idx), Some('q' | 'Q'));
    let is_quote = |idx: usize| chars.get(idx) == Some(&'\'');
    if is_q(start) && is_quote(start + 1) {
        return Some(2);
    }
    if matches!(chars.get(start), Some('n' | 'N')) && is_q(start + 1) && is_quote(start + 2) {
        return Some(3);
    }
    None
}

fn q_quote_close(delimiter: char) -> char {
    match delimiter {
        '[' => ']',
        '(' => ')',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}

/// Whether `chars[start..]` begins with `tag`.
fn starts_with_at(chars: &[char], start: usize, tag: &str) -> bool {
    let mut idx = start;
    for expected in tag.chars() {
        if chars.get(idx) != Some(&expected) {
            return false;
        }
        idx += 1;
    }
    true
}

/// Parse a dollar-quote opener (`$$` or `$tag$`) starting at `start`.
fn dollar_tag_at(chars: &[char], start: usize) -> Option<String> {
    let mut tag = String::from("$");
    let mut idx = start + 1;
    while let Some(&c) = chars.get(idx) {
        if c == '$' {
            tag.push('$');
            return Some(tag);
        }
        let valid = if idx == start + 1 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !valid {
            return None;
        }
        tag.push(c);
        idx += 1;
    }
    None
}

pub struct ScriptParser;

impl ScriptParser {
    /// Split a script into its top-level statements, numbered from 1 in source order.
    ///
    /// Comments are removed; everything else inside a statement is kept verbatim.
    /// Unterminated comments and literals swallow the rest of the input.
    pub fn split(sql: &str, dialect: Dialect) -> ParseResult {
        let mut builder = StatementBuilder::new(dialect);
        for line in sql.split_inclusive('\n') {
            builder.process_line(line);
        }
        let result = builder.finalize();
        tracing::trace!(dialect = %dialect, statements = result.len(), "Split script");
        result
    }

    /// Like [`ScriptParser::split`], but rejects absent input.
    pub fn scan(sql: Option<&str>, dialect: Dialect) -> Result<ParseResult> {
        match sql {
            Some(sql) => Ok(Self::split(sql, dialect)),
            None => Err(ScriptError::MalformedInput(
                "script text must not be null".to_string(),
            )),
        }
    }

    pub fn parse_file(path: &Path, dialect: Dialect) -> Result<ParseResult> {
        let sql = read_script(Some(path))?;
        let result = Self::split(&sql, dialect);
        tracing::debug!(
            file = %path.display(),
            dialect = %dialect,
            statements = result.len(),
            "Parsed script file"
        );
        Ok(result)
    }

    /// Text suitable for a driver call: ordinary statements lose their
    /// trailing `;`, procedural blocks keep it.
    pub fn executable_sql(statement: &str, dialect: Dialect) -> String {
        let trimmed = statement.trim();
        if dialect.is_plsql_start(trimmed) {
            trimmed.to_string()
        } else {
            trimmed.trim_end_matches(';').trim_end().to_string()
        }
    }
}
