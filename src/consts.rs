//
// Colors
//

pub const C1: &'static str = "9EC8B9";
pub const C2: &'static str = "5C8374";
pub const C3: &'static str = "93B1A6";

//
// Language
//

pub const KEYWORDS: &[&str] = &[
    "let", "mut", "const", "fn", "return", "if", "else", "while", "for",
    "break", "continue", "true", "false", "null", "match", "case",
];

pub const BUILTINS: &[&str] = &[
    "print", "input", "to_string", "to_int", "to_float", "abs", "min", "max",
    "sqrt", "pow", "len", "push", "pop", "assert", "panic",
];
