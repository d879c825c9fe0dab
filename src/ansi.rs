//! Terminal escape codes to LaTeX markup.
//!
//! Tracebacks come colored. Instead of dropping the colors, a tiny subset of SGR codes is translated
//! to LaTeX commands, written with [`COMMAND_CHAR`] instead of a backslash. The environment the text
//! ends up in (`Verbatim` with `commandchars`) knows how to read these.
//!
//! Background colors (codes 40-47) are recognized by terminals, but are not translated here:
//! `\colorbox` does not nest with the verbatim environment the way `\textcolor` does.

/// Replaces `\` as a command character, since backslashes are all over tracebacks
pub const COMMAND_CHAR: char = '¤';

/// Color names, in the order of ANSI color codes
const ANSI_COLOR: [&str; 8] = [
    "black", "red", "green", "yellow", "blue", "magenta", "cyan", "white",
];

/// Translator state. Lives for a single [`translate`] call.
#[derive(Debug, Default)]
struct Sgr {
    output: String,
    // number of currently open braces
    level: usize,
    // whether a foreground color is open
    foreground: bool,
    in_escape: bool,
    code: u32,
}

impl Sgr {
    fn open(&mut self, command: &str, argument: Option<&str>) {
        self.output.push(COMMAND_CHAR);
        self.output.push_str(command);
        if let Some(argument) = argument {
            self.output.push('{');
            self.output.push_str(argument);
            self.output.push('}');
        }
        self.output.push('{');
        self.level += 1;
    }

    fn close(&mut self, count: usize) {
        let count = count.min(self.level);
        self.output.extend(std::iter::repeat('}').take(count));
        self.level -= count;
    }

    /// Applies accumulated code
    fn apply(&mut self) {
        match self.code {
            0 => {
                self.close(self.level);
                self.foreground = false;
            }
            1 => self.open("textbf", None),
            2 => self.open("textit", None),
            code @ 30..=37 => {
                if self.foreground {
                    self.close(1);
                }
                self.open("textcolor", Some(ANSI_COLOR[(code % 10) as usize]));
                self.foreground = true;
            }
            _ => {}
        }
        self.code = 0;
    }

    fn push(&mut self, c: char) {
        if !self.in_escape {
            if c == '\x1b' {
                self.in_escape = true;
                self.code = 0;
            } else {
                self.output.push(c);
            }
            return;
        }
        match c {
            '[' => {}
            '0'..='9' => {
                let digit = c.to_digit(10).unwrap_or_default();
                self.code = self.code.saturating_mul(10).saturating_add(digit);
            }
            ';' => self.apply(),
            'm' => {
                self.apply();
                self.in_escape = false;
            }
            // final byte of some other sequence (cursor movement and such)
            '@'..='~' => {
                self.code = 0;
                self.in_escape = false;
            }
            // intermediate or private parameter bytes
            _ => {}
        }
    }
}

/// Strips ANSI escape sequences out of `lines`, replacing styles with LaTeX markup
///
/// A newline is appended after every line. Braces opened here are not closed at the end,
/// unless the text resets the style itself.
pub fn translate<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> String {
    let mut sgr = Sgr::default();
    for line in lines {
        for c in line.as_ref().chars() {
            sgr.push(c);
        }
        sgr.output.push('\n');
    }
    sgr.output
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test {
        {$name:ident, [$($line:literal),* $(,)?], $expected:literal} => {
            #[test]
            fn $name() {
                // arrange
                let lines: &[&str] = &[$($line),*];

                // act
                let output = translate(lines);

                // assert
                assert_eq!(output, $expected);
            }
        };
    }

    test! {plain, ["no escapes here", "second"], "no escapes here\nsecond\n"}
    test! {bold, ["\x1b[1mBoom\x1b[0m"], "¤textbf{Boom}\n"}
    test! {italic, ["\x1b[2mslanted\x1b[0m"], "¤textit{slanted}\n"}
    test! {color, ["\x1b[31mred\x1b[0m"], "¤textcolor{red}{red}\n"}
    test! {color_switch, ["\x1b[31mred\x1b[32mgreen\x1b[0m"], "¤textcolor{red}{red}¤textcolor{green}{green}\n"}
    test! {combined, ["\x1b[1;34mx\x1b[0m"], "¤textbf{¤textcolor{blue}{x}}\n"}
    test! {reset_without_open, ["\x1b[0mtext"], "text\n"}
    test! {default_reset, ["\x1b[1mx\x1b[m"], "¤textbf{x}\n"}
    test! {ignored_codes, ["\x1b[4;42mx\x1b[39m"], "x\n"}
    test! {background_ignored, ["\x1b[41mx\x1b[0m"], "x\n"}
    test! {other_sequence, ["\x1b[2Kcleared"], "cleared\n"}
    test! {spans_lines, ["\x1b[1mfirst", "second\x1b[0m"], "¤textbf{first\nsecond}\n"}

    fn balance(s: &str) -> i64 {
        let mut depth = 0i64;
        for c in s.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    assert!(depth >= 0, "More closes than opens in {s:?}");
                }
                _ => {}
            }
        }
        depth
    }

    #[test]
    fn single_codes_are_balanced() {
        for code in [0, 1, 2, 30, 31, 32, 33, 34, 35, 36, 37] {
            // arrange
            let line = format!("\x1b[{code}mtext\x1b[0m");

            // act
            let output = translate([line]);

            // assert
            assert_eq!(balance(&output), 0, "code {code}: {output:?}");
        }
    }

    #[test]
    fn repeated_resets_never_underflow() {
        let output = translate(["\x1b[0m\x1b[0m\x1b[1mx\x1b[0m\x1b[0m"]);
        assert_eq!(output, "¤textbf{x}\n");
    }
}
