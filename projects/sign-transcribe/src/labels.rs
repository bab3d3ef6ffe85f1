// Closed vocabularies recognized by the classifiers.
//
// Each vocabulary is an ordered symbol table: the position of a symbol is the
// class index the classifier was trained with.

use crate::error::PipelineError;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Label returned for a class index the active vocabulary does not define.
pub const UNKNOWN_LABEL: &str = "unknown";

static LETTERS: [&str; 39] = [
    "ا", "ب", "ت", "ث", "ج", "ح", "خ", "د", "ذ", "ر", //
    "ز", "س", "ش", "ص", "ض", "ط", "ظ", "ع", "غ", "ف", //
    "ق", "ك", "ل", "م", "ن", "ه", "و", "ي", "ة", "أ", //
    "ؤ", "ئ", "ئـ", "ء", "إ", "آ", "ى", "لا", "ال",
];

static NUMBERS: [&str; 31] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", //
    "10", "20", "30", "40", "50", "60", "70", "80", "90", "100", //
    "200", "300", "400", "500", "600", "700", "800", "900", //
    "1000", "1000000", "10000000",
];

static WORDS: [&str; 50] = [
    "يأكل", "يسمع", "يسكت", "يصعد", "يفتح", "يمشي", "يحب", "يفكر", "يساعد", "يقف", //
    "يدخل", "أسرة", "أب", "أم", "ناس", "جميل", "طويل", "نحيف", "خائف", "سعيد", //
    "حزين", "شجاع", "كريم", "كذاب", "صبر", "ذكي", "بين", "تحت", "خلف", "فوق", //
    "يسار", "يمين", "أهلا وسهلاً", "السلام عليكم", "شكراً", "صديق", "بيت", "مطبخ", //
    "سكين", "كأس", "كرسي", "تلفزيون", "مفتاح", "الله تعالى", "الحمد لله", "مهندس", //
    "معلم", "طباخ", "طبيب", "محام",
];

fn index_table(symbols: &'static [&'static str]) -> HashMap<&'static str, usize> {
    symbols.iter().enumerate().map(|(i, s)| (*s, i)).collect()
}

lazy_static! {
    static ref LETTER_INDEX: HashMap<&'static str, usize> = index_table(&LETTERS);
    static ref NUMBER_INDEX: HashMap<&'static str, usize> = index_table(&NUMBERS);
    static ref WORD_INDEX: HashMap<&'static str, usize> = index_table(&WORDS);
}

/// Vocabulary selected by the request's `model_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vocabulary {
    Letters,
    Numbers,
    Words,
}

impl Vocabulary {
    fn symbols(self) -> &'static [&'static str] {
        match self {
            Vocabulary::Letters => &LETTERS,
            Vocabulary::Numbers => &NUMBERS,
            Vocabulary::Words => &WORDS,
        }
    }

    fn index(self) -> &'static HashMap<&'static str, usize> {
        match self {
            Vocabulary::Letters => &LETTER_INDEX,
            Vocabulary::Numbers => &NUMBER_INDEX,
            Vocabulary::Words => &WORD_INDEX,
        }
    }

    /// Number of classes, i.e. the classifier's expected output width.
    pub fn len(self) -> usize {
        self.symbols().len()
    }

    pub fn is_empty(self) -> bool {
        self.symbols().is_empty()
    }

    /// Symbol for a class index, or [`UNKNOWN_LABEL`] when out of range.
    pub fn label(self, index: usize) -> &'static str {
        self.symbols().get(index).copied().unwrap_or(UNKNOWN_LABEL)
    }

    pub fn index_of(self, label: &str) -> Option<usize> {
        self.index().get(label).copied()
    }
}

impl TryFrom<u8> for Vocabulary {
    type Error = PipelineError;

    fn try_from(model_type: u8) -> Result<Self, Self::Error> {
        match model_type {
            1 => Ok(Vocabulary::Letters),
            2 => Ok(Vocabulary::Numbers),
            3 => Ok(Vocabulary::Words),
            other => Err(PipelineError::InvalidModelType(other)),
        }
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Vocabulary::Letters => "letters",
            Vocabulary::Numbers => "numbers",
            Vocabulary::Words => "words",
        };
        f.write_str(name)
    }
}
