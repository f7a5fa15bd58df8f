/// Token types for the MySQL-dialect lexer
use phf::phf_map;

/// Reserved words. Anything else lexes as an identifier and is matched by
/// the parser case-insensitively, so non-reserved words stay usable as names.
static KEYWORDS: phf::Map<&'static str, Keyword> = phf_map! {
    "add" => Keyword::Add,
    "all" => Keyword::All,
    "alter" => Keyword::Alter,
    "and" => Keyword::And,
    "as" => Keyword::As,
    "asc" => Keyword::Asc,
    "between" => Keyword::Between,
    "binary" => Keyword::Binary,
    "by" => Keyword::By,
    "cascade" => Keyword::Cascade,
    "case" => Keyword::Case,
    "change" => Keyword::Change,
    "character" => Keyword::Character,
    "check" => Keyword::Check,
    "collate" => Keyword::Collate,
    "column" => Keyword::Column,
    "constraint" => Keyword::Constraint,
    "convert" => Keyword::Convert,
    "create" => Keyword::Create,
    "cross" => Keyword::Cross,
    "current_date" => Keyword::CurrentDate,
    "current_time" => Keyword::CurrentTime,
    "current_timestamp" => Keyword::CurrentTimestamp,
    "current_user" => Keyword::CurrentUser,
    "database" => Keyword::Database,
    "databases" => Keyword::Databases,
    "default" => Keyword::Default,
    "delete" => Keyword::Delete,
    "desc" => Keyword::Desc,
    "describe" => Keyword::Describe,
    "distinct" => Keyword::Distinct,
    "div" => Keyword::Div,
    "drop" => Keyword::Drop,
    "else" => Keyword::Else,
    "exists" => Keyword::Exists,
    "explain" => Keyword::Explain,
    "false" => Keyword::False,
    "for" => Keyword::For,
    "force" => Keyword::Force,
    "foreign" => Keyword::Foreign,
    "from" => Keyword::From,
    "fulltext" => Keyword::Fulltext,
    "group" => Keyword::Group,
    "having" => Keyword::Having,
    "if" => Keyword::If,
    "ignore" => Keyword::Ignore,
    "in" => Keyword::In,
    "index" => Keyword::Index,
    "inner" => Keyword::Inner,
    "insert" => Keyword::Insert,
    "interval" => Keyword::Interval,
    "into" => Keyword::Into,
    "is" => Keyword::Is,
    "join" => Keyword::Join,
    "key" => Keyword::Key,
    "keys" => Keyword::Keys,
    "left" => Keyword::Left,
    "like" => Keyword::Like,
    "limit" => Keyword::Limit,
    "localtime" => Keyword::LocalTime,
    "localtimestamp" => Keyword::LocalTimestamp,
    "lock" => Keyword::Lock,
    "mod" => Keyword::Mod,
    "natural" => Keyword::Natural,
    "not" => Keyword::Not,
    "null" => Keyword::Null,
    "on" => Keyword::On,
    "or" => Keyword::Or,
    "order" => Keyword::Order,
    "outer" => Keyword::Outer,
    "primary" => Keyword::Primary,
    "references" => Keyword::References,
    "regexp" => Keyword::Regexp,
    "release" => Keyword::Release,
    "rename" => Keyword::Rename,
    "replace" => Keyword::Replace,
    "restrict" => Keyword::Restrict,
    "right" => Keyword::Right,
    "rlike" => Keyword::Rlike,
    "schema" => Keyword::Schema,
    "schemas" => Keyword::Schemas,
    "select" => Keyword::Select,
    "separator" => Keyword::Separator,
    "set" => Keyword::Set,
    "show" => Keyword::Show,
    "spatial" => Keyword::Spatial,
    "straight_join" => Keyword::StraightJoin,
    "table" => Keyword::Table,
    "then" => Keyword::Then,
    "to" => Keyword::To,
    "true" => Keyword::True,
    "union" => Keyword::Union,
    "unique" => Keyword::Unique,
    "unsigned" => Keyword::Unsigned,
    "update" => Keyword::Update,
    "use" => Keyword::Use,
    "using" => Keyword::Using,
    "values" => Keyword::Values,
    "when" => Keyword::When,
    "where" => Keyword::Where,
    "with" => Keyword::With,
    "xor" => Keyword::Xor,
    "zerofill" => Keyword::Zerofill,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Add,
    All,
    Alter,
    And,
    As,
    Asc,
    Between,
    Binary,
    By,
    Cascade,
    Case,
    Change,
    Character,
    Check,
    Collate,
    Column,
    Constraint,
    Convert,
    Create,
    Cross,
    CurrentDate,
    CurrentTime,
    CurrentTimestamp,
    CurrentUser,
    Database,
    Databases,
    Default,
    Delete,
    Desc,
    Describe,
    Distinct,
    Div,
    Drop,
    Else,
    Exists,
    Explain,
    False,
    For,
    Force,
    Foreign,
    From,
    Fulltext,
    Group,
    Having,
    If,
    Ignore,
    In,
    Index,
    Inner,
    Insert,
    Interval,
    Into,
    Is,
    Join,
    Key,
    Keys,
    Left,
    Like,
    Limit,
    LocalTime,
    LocalTimestamp,
    Lock,
    Mod,
    Natural,
    Not,
    Null,
    On,
    Or,
    Order,
    Outer,
    Primary,
    References,
    Regexp,
    Release,
    Rename,
    Replace,
    Restrict,
    Right,
    Rlike,
    Schema,
    Schemas,
    Select,
    Separator,
    Set,
    Show,
    Spatial,
    StraightJoin,
    Table,
    Then,
    To,
    True,
    Union,
    Unique,
    Unsigned,
    Update,
    Use,
    Using,
    Values,
    When,
    Where,
    With,
    Xor,
    Zerofill,
}

/// Scope prefix of a `@@` system variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    Global,
    Session,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    Keyword(Keyword),

    // Operators
    Eq,           // =
    NullSafeEq,   // <=>
    Ne,           // != or <>
    Lt,           // <
    Gt,           // >
    Le,           // <=
    Ge,           // >=
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Ampersand,    // &
    Pipe,         // |
    Caret,        // ^
    Tilde,        // ~
    ShiftLeft,    // <<
    ShiftRight,   // >>
    LogicalAnd,   // &&
    LogicalOr,    // || (PIPES_AS_CONCAT is not emulated)
    Bang,         // !
    Assign,       // :=
    Arrow,        // ->
    LongArrow,    // ->>

    // Delimiters
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,

    // Literals
    /// Numeric literal text, kept verbatim so exact decimals survive
    Number(String),
    /// Decoded string literal (escapes applied, adjacent literals joined)
    String(String),
    /// `X'..'` and `0x..`
    HexString(Vec<u8>),
    /// `B'..'` and `0b..`
    BitString(Vec<u8>),
    Identifier(String),
    /// Backtick-quoted name (never a keyword)
    QuotedIdentifier(String),
    /// `@name`
    UserVariable(String),
    /// `@@[global.|session.]name`
    SystemVariable {
        scope: Option<VariableScope>,
        name: String,
    },
    /// `?`
    Placeholder,

    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
    /// Byte range in the source, used for result column labels
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(token_type: TokenType, line: usize, column: usize) -> Self {
        Self {
            token_type,
            line,
            column,
            start: 0,
            end: 0,
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

impl TokenType {
    /// O(1) reserved word lookup
    pub fn from_keyword(s: &str) -> Option<Self> {
        let lowercase = s.to_ascii_lowercase();
        KEYWORDS.get(lowercase.as_str()).map(|k| TokenType::Keyword(*k))
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(self, TokenType::Keyword(k) if *k == kw)
    }

    /// Bare or quoted identifier text, or a non-reserved word.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            TokenType::Identifier(s) | TokenType::QuotedIdentifier(s) => Some(s),
            _ => None,
        }
    }

    /// Case-insensitive match of a non-reserved word.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, TokenType::Identifier(s) if s.eq_ignore_ascii_case(word))
    }
}

/// Whether a bare word is reserved and must be quoted to be used as a name.
pub fn is_reserved(word: &str) -> bool {
    KEYWORDS.contains_key(word.to_ascii_lowercase().as_str())
}
