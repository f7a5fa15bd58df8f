//! Declared MySQL column types
//!
//! A [`DataType`] is normalized once when parsed, so rendering it back
//! (`COLUMN_TYPE`, `SHOW CREATE TABLE`) is deterministic.

use super::TypeFamily;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Decimal,
    Float,
    Double,
    Bit,
    Char,
    VarChar,
    TinyText,
    Text,
    MediumText,
    LongText,
    Binary,
    VarBinary,
    TinyBlob,
    Blob,
    MediumBlob,
    LongBlob,
    Enum,
    Set,
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,
    Json,
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl TypeKind {
    /// Lower-case name as reported in `information_schema.COLUMNS.DATA_TYPE`.
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::TinyInt => "tinyint",
            TypeKind::SmallInt => "smallint",
            TypeKind::MediumInt => "mediumint",
            TypeKind::Int => "int",
            TypeKind::BigInt => "bigint",
            TypeKind::Decimal => "decimal",
            TypeKind::Float => "float",
            TypeKind::Double => "double",
            TypeKind::Bit => "bit",
            TypeKind::Char => "char",
            TypeKind::VarChar => "varchar",
            TypeKind::TinyText => "tinytext",
            TypeKind::Text => "text",
            TypeKind::MediumText => "mediumtext",
            TypeKind::LongText => "longtext",
            TypeKind::Binary => "binary",
            TypeKind::VarBinary => "varbinary",
            TypeKind::TinyBlob => "tinyblob",
            TypeKind::Blob => "blob",
            TypeKind::MediumBlob => "mediumblob",
            TypeKind::LongBlob => "longblob",
            TypeKind::Enum => "enum",
            TypeKind::Set => "set",
            TypeKind::Date => "date",
            TypeKind::Time => "time",
            TypeKind::DateTime => "datetime",
            TypeKind::Timestamp => "timestamp",
            TypeKind::Year => "year",
            TypeKind::Json => "json",
            TypeKind::Geometry => "geometry",
            TypeKind::Point => "point",
            TypeKind::LineString => "linestring",
            TypeKind::Polygon => "polygon",
            TypeKind::MultiPoint => "multipoint",
            TypeKind::MultiLineString => "multilinestring",
            TypeKind::MultiPolygon => "multipolygon",
            TypeKind::GeometryCollection => "geomcollection",
        }
    }
}

/// A normalized declared column type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataType {
    pub kind: TypeKind,
    /// CHAR/VARCHAR/BINARY/VARBINARY/BIT length, or display width kept for
    /// `tinyint(1)` and ZEROFILL integers
    pub length: Option<u32>,
    /// DECIMAL/FLOAT/DOUBLE precision, or fractional seconds for temporal types
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub unsigned: bool,
    pub zerofill: bool,
    /// ENUM / SET members in declaration order
    pub values: Vec<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
}

impl DataType {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            length: None,
            precision: None,
            scale: None,
            unsigned: false,
            zerofill: false,
            values: Vec::new(),
            charset: None,
            collation: None,
        }
    }

    pub fn int() -> Self {
        Self::new(TypeKind::Int)
    }

    pub fn bigint_unsigned() -> Self {
        let mut t = Self::new(TypeKind::BigInt);
        t.unsigned = true;
        t
    }

    pub fn varchar(len: u32) -> Self {
        let mut t = Self::new(TypeKind::VarChar);
        t.length = Some(len);
        t
    }

    /// Normalize a parsed type name with its numeric arguments.
    ///
    /// `args` are the parenthesized numbers (`DECIMAL(10,2)` gives `[10, 2]`),
    /// `values` the quoted members of ENUM/SET. Returns `None` for unknown
    /// names or malformed argument lists.
    pub fn from_parts(name: &str, args: &[u32], values: Vec<String>) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let mut t = match upper.as_str() {
            "TINYINT" | "INT1" => Self::new(TypeKind::TinyInt),
            "BOOL" | "BOOLEAN" => {
                let mut t = Self::new(TypeKind::TinyInt);
                t.length = Some(1);
                return Some(t);
            }
            "SMALLINT" | "INT2" => Self::new(TypeKind::SmallInt),
            "MEDIUMINT" | "INT3" | "MIDDLEINT" => Self::new(TypeKind::MediumInt),
            "INT" | "INTEGER" | "INT4" => Self::new(TypeKind::Int),
            "BIGINT" | "INT8" => Self::new(TypeKind::BigInt),
            "SERIAL" => return Some(Self::bigint_unsigned()),
            "DECIMAL" | "DEC" | "NUMERIC" | "FIXED" => Self::new(TypeKind::Decimal),
            "FLOAT" | "FLOAT4" => Self::new(TypeKind::Float),
            "DOUBLE" | "REAL" | "FLOAT8" => Self::new(TypeKind::Double),
            "BIT" => Self::new(TypeKind::Bit),
            "CHAR" | "CHARACTER" | "NCHAR" => Self::new(TypeKind::Char),
            "VARCHAR" | "CHARACTER VARYING" | "NVARCHAR" | "VARCHARACTER" => {
                Self::new(TypeKind::VarChar)
            }
            "TINYTEXT" => Self::new(TypeKind::TinyText),
            "TEXT" => Self::new(TypeKind::Text),
            "MEDIUMTEXT" | "LONG" | "LONG VARCHAR" => Self::new(TypeKind::MediumText),
            "LONGTEXT" => Self::new(TypeKind::LongText),
            "BINARY" => Self::new(TypeKind::Binary),
            "VARBINARY" => Self::new(TypeKind::VarBinary),
            "TINYBLOB" => Self::new(TypeKind::TinyBlob),
            "BLOB" => Self::new(TypeKind::Blob),
            "MEDIUMBLOB" | "LONG VARBINARY" => Self::new(TypeKind::MediumBlob),
            "LONGBLOB" => Self::new(TypeKind::LongBlob),
            "ENUM" => Self::new(TypeKind::Enum),
            "SET" => Self::new(TypeKind::Set),
            "DATE" => Self::new(TypeKind::Date),
            "TIME" => Self::new(TypeKind::Time),
            "DATETIME" => Self::new(TypeKind::DateTime),
            "TIMESTAMP" => Self::new(TypeKind::Timestamp),
            "YEAR" => Self::new(TypeKind::Year),
            "JSON" => Self::new(TypeKind::Json),
            "GEOMETRY" => Self::new(TypeKind::Geometry),
            "POINT" => Self::new(TypeKind::Point),
            "LINESTRING" => Self::new(TypeKind::LineString),
            "POLYGON" => Self::new(TypeKind::Polygon),
            "MULTIPOINT" => Self::new(TypeKind::MultiPoint),
            "MULTILINESTRING" => Self::new(TypeKind::MultiLineString),
            "MULTIPOLYGON" => Self::new(TypeKind::MultiPolygon),
            "GEOMETRYCOLLECTION" | "GEOMCOLLECTION" => Self::new(TypeKind::GeometryCollection),
            _ => return None,
        };

        match t.kind {
            TypeKind::TinyInt
            | TypeKind::SmallInt
            | TypeKind::MediumInt
            | TypeKind::Int
            | TypeKind::BigInt => {
                if args.len() > 1 {
                    return None;
                }
                // Display widths are dropped, except the boolean idiom
                if t.kind == TypeKind::TinyInt && args == [1] {
                    t.length = Some(1);
                }
            }
            TypeKind::Decimal => {
                let precision = args.first().copied().unwrap_or(10);
                let scale = args.get(1).copied().unwrap_or(0);
                if args.len() > 2 || precision == 0 || precision > 65 || scale > 30 || scale > precision {
                    return None;
                }
                t.precision = Some(precision);
                t.scale = Some(scale);
            }
            TypeKind::Float => match args {
                [] => {}
                // FLOAT(p) picks single or double precision
                [p] if *p <= 24 => {}
                [p] if *p <= 53 => t.kind = TypeKind::Double,
                [m, d] if *d <= *m && *m <= 255 && *d <= 30 => {
                    t.precision = Some(*m);
                    t.scale = Some(*d);
                }
                _ => return None,
            },
            TypeKind::Double => match args {
                [] => {}
                [m, d] if *d <= *m && *m <= 255 && *d <= 30 => {
                    t.precision = Some(*m);
                    t.scale = Some(*d);
                }
                _ => return None,
            },
            TypeKind::Bit => {
                let n = args.first().copied().unwrap_or(1);
                if args.len() > 1 || n == 0 || n > 64 {
                    return None;
                }
                t.length = Some(n);
            }
            TypeKind::Char | TypeKind::Binary => {
                let n = args.first().copied().unwrap_or(1);
                if args.len() > 1 || n > 255 {
                    return None;
                }
                t.length = Some(n);
            }
            TypeKind::VarChar | TypeKind::VarBinary => {
                // VARCHAR requires an explicit length
                match args {
                    [n] if *n <= 65535 => t.length = Some(*n),
                    _ => return None,
                }
            }
            TypeKind::Text | TypeKind::Blob => {
                // TEXT(n) picks the smallest type that holds n characters
                if let Some(&n) = args.first() {
                    let text = t.kind == TypeKind::Text;
                    t.kind = match n {
                        0..=255 => if text { TypeKind::TinyText } else { TypeKind::TinyBlob },
                        256..=65535 => if text { TypeKind::Text } else { TypeKind::Blob },
                        65536..=16_777_215 => {
                            if text { TypeKind::MediumText } else { TypeKind::MediumBlob }
                        }
                        _ => if text { TypeKind::LongText } else { TypeKind::LongBlob },
                    };
                }
            }
            TypeKind::Time | TypeKind::DateTime | TypeKind::Timestamp => {
                let fsp = args.first().copied().unwrap_or(0);
                if args.len() > 1 || fsp > 6 {
                    return None;
                }
                if fsp > 0 {
                    t.precision = Some(fsp);
                }
            }
            TypeKind::Year => {
                if !(args.is_empty() || args == [4]) {
                    return None;
                }
            }
            TypeKind::Enum | TypeKind::Set => {
                if values.is_empty() || (t.kind == TypeKind::Set && values.len() > 64) {
                    return None;
                }
                t.values = values;
            }
            _ => {
                if !args.is_empty() {
                    return None;
                }
            }
        }
        Some(t)
    }

    /// Apply ZEROFILL, which implies UNSIGNED and keeps the display width.
    pub fn set_zerofill(&mut self, width: Option<u32>) {
        self.zerofill = true;
        self.unsigned = true;
        if self.is_integer() {
            self.length = Some(width.unwrap_or_else(|| self.default_display_width()));
        }
    }

    fn default_display_width(&self) -> u32 {
        match self.kind {
            TypeKind::TinyInt => 3,
            TypeKind::SmallInt => 5,
            TypeKind::MediumInt => 8,
            TypeKind::Int => 10,
            _ => 20,
        }
    }

    pub fn family(&self) -> TypeFamily {
        match self.kind {
            TypeKind::TinyInt
            | TypeKind::SmallInt
            | TypeKind::MediumInt
            | TypeKind::Int
            | TypeKind::BigInt => TypeFamily::Integer,
            TypeKind::Decimal => TypeFamily::Decimal,
            TypeKind::Float | TypeKind::Double => TypeFamily::Float,
            TypeKind::Bit => TypeFamily::Bit,
            TypeKind::Char
            | TypeKind::VarChar
            | TypeKind::TinyText
            | TypeKind::Text
            | TypeKind::MediumText
            | TypeKind::LongText => TypeFamily::String,
            TypeKind::Binary
            | TypeKind::VarBinary
            | TypeKind::TinyBlob
            | TypeKind::Blob
            | TypeKind::MediumBlob
            | TypeKind::LongBlob => TypeFamily::Binary,
            TypeKind::Enum => TypeFamily::Enum,
            TypeKind::Set => TypeFamily::Set,
            TypeKind::Date => TypeFamily::Date,
            TypeKind::Time => TypeFamily::Time,
            TypeKind::DateTime => TypeFamily::DateTime,
            TypeKind::Timestamp => TypeFamily::Timestamp,
            TypeKind::Year => TypeFamily::Year,
            TypeKind::Json => TypeFamily::Json,
            _ => TypeFamily::Geometry,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.family() == TypeFamily::Integer
    }

    /// BIGINT UNSIGNED: values above `i64::MAX` live natively as their
    /// two's-complement bit pattern.
    pub fn is_unsigned_bigint(&self) -> bool {
        self.kind == TypeKind::BigInt && self.unsigned
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.family(),
            TypeFamily::Integer | TypeFamily::Decimal | TypeFamily::Float | TypeFamily::Bit | TypeFamily::Year
        )
    }

    /// TEXT/BLOB/JSON/GEOMETRY columns: no literal defaults, no index without prefix.
    pub fn is_lob(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::TinyText
                | TypeKind::Text
                | TypeKind::MediumText
                | TypeKind::LongText
                | TypeKind::TinyBlob
                | TypeKind::Blob
                | TypeKind::MediumBlob
                | TypeKind::LongBlob
                | TypeKind::Json
        ) || self.family() == TypeFamily::Geometry
    }

    /// Whether the type carries a character set and collation.
    pub fn is_textual(&self) -> bool {
        matches!(
            self.family(),
            TypeFamily::String | TypeFamily::Enum | TypeFamily::Set
        )
    }

    /// Inclusive value range of an integer type.
    pub fn integer_range(&self) -> (i128, i128) {
        let bits = match self.kind {
            TypeKind::TinyInt => 8,
            TypeKind::SmallInt => 16,
            TypeKind::MediumInt => 24,
            TypeKind::Int => 32,
            _ => 64,
        };
        if self.unsigned {
            (0, (1i128 << bits) - 1)
        } else {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        }
    }

    /// Maximum length in characters (strings) or bytes (binary).
    pub fn max_length(&self) -> Option<u64> {
        match self.kind {
            TypeKind::Char | TypeKind::VarChar | TypeKind::Binary | TypeKind::VarBinary => {
                self.length.map(u64::from)
            }
            TypeKind::TinyText | TypeKind::TinyBlob => Some(255),
            TypeKind::Text | TypeKind::Blob => Some(65_535),
            TypeKind::MediumText | TypeKind::MediumBlob => Some(16_777_215),
            TypeKind::LongText | TypeKind::LongBlob => Some(4_294_967_295),
            TypeKind::Enum => Some(self.values.iter().map(|v| v.chars().count()).max().unwrap_or(0) as u64),
            TypeKind::Set => {
                let total: usize = self.values.iter().map(|v| v.chars().count()).sum();
                Some((total + self.values.len().saturating_sub(1)) as u64)
            }
            _ => None,
        }
    }

    /// Byte length for `CHARACTER_OCTET_LENGTH` (utf8mb4 is four bytes per char).
    pub fn octet_length(&self) -> Option<u64> {
        let len = self.max_length()?;
        if matches!(self.family(), TypeFamily::Binary) {
            return Some(len);
        }
        match self.kind {
            TypeKind::TinyText | TypeKind::Text | TypeKind::MediumText | TypeKind::LongText => {
                Some(len)
            }
            _ => Some(len * 4),
        }
    }

    pub fn numeric_precision(&self) -> Option<u64> {
        match self.kind {
            TypeKind::TinyInt => Some(3),
            TypeKind::SmallInt => Some(5),
            TypeKind::MediumInt => Some(7),
            TypeKind::Int => Some(10),
            TypeKind::BigInt => Some(if self.unsigned { 20 } else { 19 }),
            TypeKind::Decimal => self.precision.map(u64::from),
            TypeKind::Float => Some(self.precision.map(u64::from).unwrap_or(12)),
            TypeKind::Double => Some(self.precision.map(u64::from).unwrap_or(22)),
            TypeKind::Bit => self.length.map(u64::from),
            _ => None,
        }
    }

    pub fn numeric_scale(&self) -> Option<u64> {
        match self.family() {
            TypeFamily::Integer => Some(0),
            TypeFamily::Decimal => self.scale.map(u64::from),
            TypeFamily::Float => self.scale.map(u64::from),
            _ => None,
        }
    }

    pub fn datetime_precision(&self) -> Option<u64> {
        match self.kind {
            TypeKind::Date => Some(0),
            TypeKind::Time | TypeKind::DateTime | TypeKind::Timestamp => {
                Some(self.precision.unwrap_or(0) as u64)
            }
            _ => None,
        }
    }

    /// Fractional second digits for temporal types.
    pub fn fsp(&self) -> u32 {
        if self.family().is_temporal() {
            self.precision.unwrap_or(0)
        } else {
            0
        }
    }

    /// Native column affinity used when creating the storage table.
    pub fn native_type(&self) -> &'static str {
        match self.family() {
            TypeFamily::Integer | TypeFamily::Bit | TypeFamily::Year => "INTEGER",
            TypeFamily::Decimal | TypeFamily::Float => "REAL",
            TypeFamily::Binary | TypeFamily::Geometry => "BLOB",
            _ => "TEXT",
        }
    }

    /// `COLUMN_TYPE` rendering, e.g. `int unsigned`, `varchar(255)`, `enum('a','b')`.
    pub fn column_type(&self) -> String {
        let mut out = self.kind.name().to_string();
        match self.kind {
            TypeKind::Decimal => {
                out.push_str(&format!(
                    "({},{})",
                    self.precision.unwrap_or(10),
                    self.scale.unwrap_or(0)
                ));
            }
            TypeKind::Float | TypeKind::Double => {
                if let (Some(m), Some(d)) = (self.precision, self.scale) {
                    out.push_str(&format!("({},{})", m, d));
                }
            }
            TypeKind::Enum | TypeKind::Set => {
                let members: Vec<String> = self
                    .values
                    .iter()
                    .map(|v| format!("'{}'", v.replace('\'', "''")))
                    .collect();
                out.push_str(&format!("({})", members.join(",")));
            }
            TypeKind::Time | TypeKind::DateTime | TypeKind::Timestamp => {
                if let Some(fsp) = self.precision {
                    out.push_str(&format!("({})", fsp));
                }
            }
            _ => {
                if let Some(len) = self.length {
                    out.push_str(&format!("({})", len));
                }
            }
        }
        if self.unsigned && self.family().is_numeric() && self.kind != TypeKind::Bit {
            out.push_str(" unsigned");
        }
        if self.zerofill {
            out.push_str(" zerofill");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str, args: &[u32]) -> DataType {
        DataType::from_parts(name, args, Vec::new()).unwrap()
    }

    #[test]
    fn test_integer_widths_dropped() {
        assert_eq!(parse("INT", &[11]).column_type(), "int");
        assert_eq!(parse("tinyint", &[1]).column_type(), "tinyint(1)");
        assert_eq!(parse("BOOLEAN", &[]).column_type(), "tinyint(1)");
        assert_eq!(parse("SERIAL", &[]).column_type(), "bigint unsigned");
    }

    #[test]
    fn test_zerofill() {
        let mut t = parse("INT", &[]);
        t.set_zerofill(None);
        assert_eq!(t.column_type(), "int(10) unsigned zerofill");
    }

    #[test]
    fn test_decimal_defaults() {
        assert_eq!(parse("DECIMAL", &[]).column_type(), "decimal(10,0)");
        assert_eq!(parse("numeric", &[8, 2]).column_type(), "decimal(8,2)");
        assert!(DataType::from_parts("DECIMAL", &[5, 6], vec![]).is_none());
    }

    #[test]
    fn test_text_sizes() {
        assert_eq!(parse("TEXT", &[100]).kind, TypeKind::TinyText);
        assert_eq!(parse("TEXT", &[1000]).kind, TypeKind::Text);
        assert!(DataType::from_parts("VARCHAR", &[], vec![]).is_none());
        assert_eq!(parse("CHAR", &[]).column_type(), "char(1)");
    }

    #[test]
    fn test_enum_rendering() {
        let t = DataType::from_parts("ENUM", &[], vec!["a".into(), "it's".into()]).unwrap();
        assert_eq!(t.column_type(), "enum('a','it''s')");
        assert_eq!(t.family(), TypeFamily::Enum);
        assert_eq!(t.max_length(), Some(4));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(parse("TINYINT", &[]).integer_range(), (-128, 127));
        let mut t = parse("SMALLINT", &[]);
        t.unsigned = true;
        assert_eq!(t.integer_range(), (0, 65535));
        assert_eq!(DataType::bigint_unsigned().integer_range().1, u64::MAX as i128);
    }

    #[test]
    fn test_temporal_precision() {
        assert_eq!(parse("DATETIME", &[3]).column_type(), "datetime(3)");
        assert_eq!(parse("TIMESTAMP", &[]).column_type(), "timestamp");
        assert!(DataType::from_parts("TIME", &[7], vec![]).is_none());
        assert_eq!(parse("FLOAT", &[30]).kind, TypeKind::Double);
    }
}
