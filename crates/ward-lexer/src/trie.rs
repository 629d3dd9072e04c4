use std::collections::BTreeMap;

/// Prefix trie over a fixed set of punctuation strings.
///
/// Lookups walk one character at a time so the script splitter can find the
/// longest operator at the current position without re-scanning.
#[derive(Debug, Clone, Default)]
pub struct PunctuationTrie {
    terminal: bool,
    children: BTreeMap<char, PunctuationTrie>,
}

impl PunctuationTrie {
    pub fn new<'a>(punctuation: impl IntoIterator<Item = &'a str>) -> Self {
        let mut root = Self::default();
        for text in punctuation {
            let mut node = &mut root;
            for ch in text.chars() {
                node = node.children.entry(ch).or_default();
            }
            node.terminal = true;
        }
        root
    }

    /// The subtrie reached by following `ch`.
    pub fn lookup(&self, ch: char) -> Option<&PunctuationTrie> {
        self.children.get(&ch)
    }

    /// Whether the path to this node spells a complete entry.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn contains(&self, text: &str) -> bool {
        let mut node = self;
        for ch in text.chars() {
            match node.lookup(ch) {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.terminal
    }

    /// Whether some entry extends this node only through a prefix that is
    /// not itself an entry, as `...` extends `.` through `..`.
    pub fn has_partial_child(&self) -> bool {
        self.children.values().any(|child| !child.terminal)
    }
}
