//! Romanization and numeral tables used by the encoder.
//!
//! Jamo are given as code points: initials in U+1100..U+1112, vowels from U+1161,
//! finals from U+11A8. The `EXTENDED_*` tables are merged in (overriding on
//! conflict) when the encoder dimension is at least [`EXTENDED_DIMENSION`].

pub const EXTENDED_DIMENSION: usize = 512;

pub const SYLLABLE_BASE: u32 = 0xAC00;
pub const SYLLABLE_LAST: u32 = 0xD7A3;
pub const INITIAL_BASE: u32 = 0x1100;
pub const VOWEL_BASE: u32 = 0x1161;
pub const FINAL_BASE: u32 = 0x11A7;

/// Initial used when a syllable starts with a vowel (ㅇ).
pub const SILENT_INITIAL: u32 = 0x110B;

pub const INITIALS: &[(&str, u32)] = &[
    ("g", 0x1100),
    ("kk", 0x1101),
    ("n", 0x1102),
    ("d", 0x1103),
    ("tt", 0x1104),
    ("r", 0x1105),
    ("l", 0x1105),
    ("m", 0x1106),
    ("b", 0x1107),
    ("v", 0x1107),
    ("pp", 0x1108),
    ("s", 0x1109),
    ("x", 0x1109),
    ("sh", 0x1109),
    ("sch", 0x1109),
    ("j", 0x110C),
    ("z", 0x110C),
    ("ch", 0x110E),
    ("tch", 0x110E),
    ("k", 0x110F),
    ("c", 0x110F),
    ("q", 0x110F),
    ("ck", 0x110F),
    ("t", 0x1110),
    ("th", 0x1110),
    ("p", 0x1111),
    ("f", 0x1111),
    ("ph", 0x1111),
    ("h", 0x1112),
];

pub const EXTENDED_INITIALS: &[(&str, u32)] = &[
    ("ss", 0x110A),
    ("bb", 0x1108),
    ("dd", 0x1104),
    ("gg", 0x1101),
    ("jj", 0x110D),
];

pub const VOWELS: &[(&str, u32)] = &[
    ("a", 0x1161),
    ("ae", 0x1162),
    ("ai", 0x1162),
    ("ay", 0x1162),
    ("ya", 0x1163),
    ("yae", 0x1164),
    ("eo", 0x1165),
    ("e", 0x1166),
    ("ei", 0x1166),
    ("ey", 0x1166),
    ("yeo", 0x1167),
    ("ye", 0x1168),
    ("o", 0x1169),
    ("au", 0x1169),
    ("oa", 0x1169),
    ("ow", 0x1169),
    ("wa", 0x116A),
    ("wae", 0x116B),
    ("oe", 0x116C),
    ("yo", 0x116D),
    ("u", 0x116E),
    ("w", 0x116E),
    ("oo", 0x116E),
    ("ou", 0x116E),
    ("wo", 0x116F),
    ("we", 0x1170),
    ("wi", 0x1171),
    ("yu", 0x1172),
    ("eu", 0x1173),
    ("ui", 0x1174),
    ("i", 0x1175),
    ("y", 0x1175),
    ("ee", 0x1175),
    ("ea", 0x1175),
    ("ie", 0x1175),
];

pub const EXTENDED_VOWELS: &[(&str, u32)] = &[
    ("yya", 0x118E),
    ("yyae", 0x118F),
    ("yyeo", 0x1190),
    ("yye", 0x1191),
    ("yyo", 0x1192),
    ("yyu", 0x1193),
    ("yyi", 0x1194),
    ("araea", 0x119E),
    ("araeae", 0x119F),
];

pub const FINALS: &[(&str, u32)] = &[
    ("g", 0x11A8),
    ("k", 0x11A8),
    ("c", 0x11A8),
    ("ck", 0x11A8),
    ("kk", 0x11A9),
    ("n", 0x11AB),
    ("d", 0x11AE),
    ("t", 0x11AE),
    ("l", 0x11AF),
    ("r", 0x11AF),
    ("m", 0x11B7),
    ("b", 0x11B8),
    ("p", 0x11B8),
    ("f", 0x11B8),
    ("v", 0x11B8),
    ("s", 0x11BA),
    ("x", 0x11BA),
    ("z", 0x11BA),
    ("ng", 0x11BC),
];

pub const EXTENDED_FINALS: &[(&str, u32)] = &[
    ("ks", 0x11AA),
    ("nj", 0x11AC),
    ("nh", 0x11AD),
    ("lk", 0x11B0),
    ("lm", 0x11B1),
    ("lp", 0x11B2),
    ("ls", 0x11B3),
    ("lt", 0x11B4),
    ("lph", 0x11B5),
    ("lh", 0x11B6),
    ("ps", 0x11B9),
    ("ss", 0x11BB),
    ("ng", 0x11BC),
    ("j", 0x11BD),
    ("ch", 0x11BE),
    ("k", 0x11BF),
    ("t", 0x11C0),
    ("p", 0x11C1),
    ("h", 0x11C2),
];

/// Spoken words for punctuation and operators.
pub const PHONETIC_EQUIVALENTS: &[(char, &str)] = &[
    ('+', "plus"),
    ('-', "minus"),
    ('*', "times"),
    ('/', "slash"),
    ('\\', "backslash"),
    ('=', "equals"),
    ('<', "less"),
    ('>', "greater"),
    ('%', "percent"),
    ('&', "and"),
    ('|', "pipe"),
    ('^', "caret"),
    ('~', "tilde"),
    ('@', "at"),
    ('#', "hash"),
    ('$', "dollar"),
    ('.', "dot"),
    (',', "comma"),
    (':', "colon"),
    (';', "semicolon"),
    ('!', "bang"),
    ('?', "question"),
    ('\'', "quote"),
    ('"', "quote"),
    ('`', "backtick"),
    ('(', "paren"),
    (')', "paren"),
    ('[', "bracket"),
    (']', "bracket"),
    ('{', "brace"),
    ('}', "brace"),
    ('_', "underscore"),
];

/// Sino-Korean digits 0 through 9.
pub const SINO_KOREAN_DIGITS: [char; 10] = ['영', '일', '이', '삼', '사', '오', '육', '칠', '팔', '구'];

/// Place-value words for positions 2 (tens) through 21, indexed by `place - 2`.
pub const PLACE_NAMES: [&str; 20] = [
    "십", "백", "천", "만", "십만", "백만", "천만", "억", "십억", "백억", "천억", "조", "십조",
    "백조", "천조", "경", "십경", "백경", "천경", "자",
];

/// Sino-Korean decimal point.
pub const DECIMAL_POINT: char = '점';

pub fn phonetic_equivalent(c: char) -> Option<&'static str> {
    PHONETIC_EQUIVALENTS
        .iter()
        .find(|(symbol, _)| *symbol == c)
        .map(|(_, word)| *word)
}

pub fn place_name(place: usize) -> Option<&'static str> {
    place.checked_sub(2).and_then(|i| PLACE_NAMES.get(i)).copied()
}
