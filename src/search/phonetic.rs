//! Phonetic folding for transliterated Latin-script terms.
//!
//! Alternate romanizations of the same Arabic name or word ("Mohammed",
//! "Muhammad"; "Saheeh", "Sahih") fold to one short consonant skeleton so
//! they can be matched against each other.

/// Maximum length of a phonetic code.
pub const MAX_CODE_LEN: usize = 8;

/// Digraph and vowel-cluster folds, applied in order over the whole string.
const SUBSTITUTIONS: [(&str, &str); 15] = [
    ("gh", "g"),
    ("kh", "k"),
    ("sh", "s"),
    ("th", "t"),
    ("dh", "d"),
    ("zh", "z"),
    ("ph", "f"),
    ("qu", "k"),
    ("ee", "i"),
    ("aa", "a"),
    ("oo", "u"),
    ("ou", "u"),
    ("ei", "i"),
    ("ai", "a"),
    ("ay", "a"),
];

const fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Compute the phonetic code of a token.
///
/// Only ASCII letters survive; non-Latin input yields an empty code.
/// Inputs with fewer than two letters are returned without folding.
#[must_use]
pub fn phonetic_code(token: &str) -> String {
    let letters: String = token
        .chars()
        .flat_map(char::to_lowercase)
        .filter(char::is_ascii_lowercase)
        .collect();

    if letters.len() < 2 {
        return letters;
    }

    let folded = SUBSTITUTIONS
        .iter()
        .fold(letters, |acc, (from, to)| acc.replace(from, to));

    let mut chars = folded.chars();
    let mut code = String::with_capacity(MAX_CODE_LEN);
    let Some(first) = chars.next() else {
        return code;
    };
    code.push(first);

    let mut last = first;
    for c in chars.filter(|c| !is_vowel(*c)) {
        if c != last {
            code.push(c);
            last = c;
        }
        if code.len() == MAX_CODE_LEN {
            break;
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_khalid_folds_to_consonant_skeleton() {
        assert_eq!(phonetic_code("khalid"), "kld");
        assert_eq!(phonetic_code("Khaalid"), "kld");
    }

    #[test]
    fn test_transliteration_variants_share_code() {
        assert_eq!(phonetic_code("muhammad"), phonetic_code("mohammed"));
        assert_eq!(phonetic_code("sahih"), phonetic_code("saheeh"));
        assert_eq!(phonetic_code("quran"), phonetic_code("kuran"));
    }

    #[test]
    fn test_first_character_kept_even_when_vowel() {
        assert_eq!(phonetic_code("umar"), "umr");
        assert_eq!(phonetic_code("aisha"), "as");
    }

    #[test]
    fn test_short_and_non_latin_input() {
        assert_eq!(phonetic_code(""), "");
        assert_eq!(phonetic_code("A"), "a");
        assert_eq!(phonetic_code("ee"), "i");
        assert_eq!(phonetic_code("السلام"), "");
        assert_eq!(phonetic_code("x-1"), "x");
    }

    #[test]
    fn test_repeated_letters_collapse() {
        // vowel removal can bring equal consonants together
        assert_eq!(phonetic_code("allah"), "alh");
        assert_eq!(phonetic_code("babab"), "b");
    }

    #[test]
    fn test_code_truncated() {
        let code = phonetic_code("bcdfgjklmnpqrstvwxz");
        assert_eq!(code.len(), MAX_CODE_LEN);
        assert_eq!(code, "bcdfgjkl");
    }
}
