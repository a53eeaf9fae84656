//! Prompt text for each model call.

/// Asks for the first complete sentence of `chunk`, verbatim.
#[must_use]
pub fn extract_sentence(chunk: &str) -> String {
    format!(
        "You are a text segmentation assistant for a LaTeX document.\n\
         Please extract the first complete sentence exactly as it appears in the text below.\n\
         A complete sentence ends with a period (.), question mark (?) or exclamation mark (!).\n\
         Include any LaTeX commands that are part of the sentence.\n\
         Return only the sentence with no additional commentary.\n\n\
         Text:\n{chunk}\n"
    )
}

/// Asks whether `sentence` is one complete sentence.
#[must_use]
pub fn verify_boundary(sentence: &str) -> String {
    format!(
        "You are a LaTeX verification assistant. Verify that the following is a complete, valid sentence:\n\n\
         Sentence: {sentence}\n\n\
         Verify that:\n\
         1. This is a complete sentence with proper beginning and end"
    )
}

/// Asks for a grammar correction of `sentence`.
#[must_use]
pub fn propose_correction(sentence: &str) -> String {
    format!(
        "You are a grammar checker for LaTeX academic papers. \
         Note that we use present tense in scientific paper, not past tense.\n\
         Analyze and correct obvious grammatical errors in the following sentence.\n\
         Do not change any scientific notation, name of quantum systems, LaTeX commands, \
         math expressions (delimited by $ or $$), and citations.\n\n\
         Input sentence: {sentence}"
    )
}

/// Asks QA to compare `original` with `corrected`.
#[must_use]
pub fn validate_correction(original: &str, corrected: &str) -> String {
    format!(
        "You are a LaTeX quality assurance expert.\n\
         Compare the following original and corrected sentences to ensure grammar corrections are valid\n\
         and do not alter the original meaning:\n\n\
         Original: {original}\n\
         Corrected: {corrected}\n\n\
         Analyze for:\n\
         1. Grammar improvement without meaning change\n\
         2. Preservation of technical accuracy\n\
         3. LaTeX command integrity"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_embed_their_inputs() {
        assert!(extract_sentence("A b. C d.").ends_with("Text:\nA b. C d.\n"));
        assert!(verify_boundary("A b.").contains("Sentence: A b.\n"));
        assert!(propose_correction("$x$ are big.").contains("Input sentence: $x$ are big."));

        let qa = validate_correction("He go.", "He goes.");
        assert!(qa.contains("Original: He go.\nCorrected: He goes."));
        assert!(qa.contains("LaTeX command integrity"));
    }
}
