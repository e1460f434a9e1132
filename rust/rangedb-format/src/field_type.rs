use rangedb_common::{Result, error::Error};

/// Type tag of an indexed field, stored as a little-endian `u16` in the index metadata.
///
/// A field name may be indexed under several types, one tree per type. The n-gram types
/// hold search tokens rather than field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum FieldType {
    String = 0,
    Int64 = 1,
    Uint64 = 2,
    Float64 = 3,
    Object = 4,
    Array = 5,
    Boolean = 6,
    Null = 7,
    Trigram = 8,
    Bigram = 9,
    Unigram = 10,
}

impl FieldType {
    pub fn from_tag(tag: u16) -> Result<FieldType> {
        Ok(match tag {
            0 => FieldType::String,
            1 => FieldType::Int64,
            2 => FieldType::Uint64,
            3 => FieldType::Float64,
            4 => FieldType::Object,
            5 => FieldType::Array,
            6 => FieldType::Boolean,
            7 => FieldType::Null,
            8 => FieldType::Trigram,
            9 => FieldType::Bigram,
            10 => FieldType::Unigram,
            _ => {
                return Err(Error::malformed_meta(format!("unknown field type tag {tag}")));
            }
        })
    }

    pub fn tag(self) -> u16 {
        self as u16
    }

    pub fn is_ngram(self) -> bool {
        matches!(
            self,
            FieldType::Unigram | FieldType::Bigram | FieldType::Trigram
        )
    }

    /// The n-gram type for tokens of `size` characters.
    pub fn ngram(size: usize) -> Option<FieldType> {
        match size {
            1 => Some(FieldType::Unigram),
            2 => Some(FieldType::Bigram),
            3 => Some(FieldType::Trigram),
            _ => None,
        }
    }

    pub fn gram_size(self) -> Option<usize> {
        match self {
            FieldType::Unigram => Some(1),
            FieldType::Bigram => Some(2),
            FieldType::Trigram => Some(3),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Float64 => "float64",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Boolean => "boolean",
            FieldType::Null => "null",
            FieldType::Trigram => "trigram",
            FieldType::Bigram => "bigram",
            FieldType::Unigram => "unigram",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
