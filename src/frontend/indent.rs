use tracing::warn;

/// Width a tab contributes to indentation.
pub const TAB_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indentation {
    pub width: usize,
    /// Leading whitespace mixed tabs and spaces.
    pub mixed: bool,
}

/// Measure the leading whitespace of `line`.
///
/// Tabs count [`TAB_WIDTH`], spaces count one. Mixing the two is legal but
/// ambiguous across editors, so it logs a warning; the width is unaffected.
pub fn measure(line: &str, line_number: usize) -> Indentation {
    let mut width = 0;
    let mut tabs = false;
    let mut spaces = false;

    for ch in line.chars() {
        match ch {
            ' ' => {
                spaces = true;
                width += 1;
            }
            '\t' => {
                tabs = true;
                width += TAB_WIDTH;
            }
            _ => break,
        }
    }

    let mixed = tabs && spaces;
    if mixed {
        warn!(line = line_number, width, "indentation mixes tabs and spaces");
    }

    Indentation { width, mixed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_count_one() {
        assert_eq!(
            measure("    Hello", 1),
            Indentation {
                width: 4,
                mixed: false
            }
        );
    }

    #[test]
    fn test_tabs_count_eight() {
        assert_eq!(measure("\t\tHello", 1).width, 16);
        assert!(!measure("\tHello", 1).mixed);
    }

    #[test]
    fn test_mixed_whitespace_warns_without_changing_width() {
        let indentation = measure("\t  -> Option", 3);
        assert!(indentation.mixed);
        assert_eq!(indentation.width, TAB_WIDTH + 2);
        assert_eq!(measure("  \tx", 4).width, 2 + TAB_WIDTH);
    }

    #[test]
    fn test_only_leading_whitespace_counts() {
        assert_eq!(measure("a \t b", 1).width, 0);
        assert_eq!(measure("", 1).width, 0);
        assert_eq!(measure("   ", 1).width, 3);
    }
}
