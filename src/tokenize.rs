use log::trace;

/// Quoting state of the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InSingle,
    InDouble,
    /// A backslash was seen outside quotes.
    EscapeNormal,
    /// A backslash was seen inside double quotes.
    EscapeDouble,
}

/// Character classes the transition table distinguishes.
#[derive(Debug, Clone, Copy)]
enum Class {
    SingleQuote,
    DoubleQuote,
    Backslash,
    Space,
    Other,
}

impl Class {
    fn of(c: char) -> Self {
        match c {
            '\'' => Class::SingleQuote,
            '"' => Class::DoubleQuote,
            '\\' => Class::Backslash,
            ' ' => Class::Space,
            _ => Class::Other,
        }
    }
}

struct Tokenizer {
    state: State,
    current: String,
    tokens: Vec<String>,
}

impl Tokenizer {
    fn new() -> Self {
        Self {
            state: State::Normal,
            current: String::new(),
            tokens: Vec::new(),
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.tokens.push(std::mem::take(&mut self.current));
        }
    }

    fn step(&mut self, c: char) {
        use Class::*;
        use State::*;

        let next = match (self.state, Class::of(c)) {
            (Normal, SingleQuote) => InSingle,
            (Normal, DoubleQuote) => InDouble,
            (Normal, Backslash) => EscapeNormal,
            (Normal, Space) => {
                self.flush();
                Normal
            }
            (Normal, Other) => {
                self.current.push(c);
                Normal
            }

            (InSingle, SingleQuote) => Normal,
            (InSingle, _) => {
                self.current.push(c);
                InSingle
            }

            (InDouble, DoubleQuote) => Normal,
            (InDouble, Backslash) => EscapeDouble,
            (InDouble, _) => {
                self.current.push(c);
                InDouble
            }

            (EscapeNormal, _) => {
                self.current.push(c);
                Normal
            }

            // Inside double quotes a backslash only escapes `"` and itself.
            (EscapeDouble, DoubleQuote | Backslash) => {
                self.current.push(c);
                InDouble
            }
            (EscapeDouble, _) => {
                self.current.push('\\');
                self.current.push(c);
                InDouble
            }
        };

        trace!("{:?} --{:?}--> {:?}", self.state, c, next);
        self.state = next;
    }

    fn finish(mut self) -> Vec<String> {
        // Unterminated quotes and a trailing backslash are not errors.
        self.flush();
        self.tokens
    }
}

/// Tokenizes shell input into a vector of strings.
/// Handles single quotes, double quotes and backslash escapes.
pub fn tokenize(input: &str) -> Vec<String> {
    if input.trim().is_empty() {
        return Vec::new();
    }

    let mut tokenizer = Tokenizer::new();
    input
        .trim_end_matches(['\n', '\r'])
        .chars()
        .for_each(|c| tokenizer.step(c));
    tokenizer.finish()
}
