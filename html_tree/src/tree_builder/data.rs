//! Doctype-driven quirks-mode detection (spec.md §4.3 "Doctype / quirks").
//! The teacher's own `data.rs` backing this lives outside the retrieval
//! pack; the table below is reconstructed directly from spec.md's
//! wording plus the WHATWG "quirks mode" algorithm it paraphrases.

use html_tree_dom::QuirksMode;

use crate::tokenizer::Doctype;

const QUIRKY_PUBLIC_PREFIXES: &[&str] = &[
    "-//w3o//dtd w3 html strict 3.0//en//",
    "-/w3d/dtd html 4.0 transitional/en",
    "html",
    "+//silmaril//dtd html pro v0r11 19970101//",
    "-//as//dtd html 3.0 aswedit + extensions//",
    "-//advasoft ltd//dtd html 3.0 aswedit + extensions//",
    "-//ietf//dtd html 2.0 level 1//",
    "-//ietf//dtd html 2.0 level 2//",
    "-//ietf//dtd html 2.0 strict level 1//",
    "-//ietf//dtd html 2.0 strict level 2//",
    "-//ietf//dtd html 2.0 strict//",
    "-//ietf//dtd html 2.0//",
    "-//ietf//dtd html 2.1e//",
    "-//ietf//dtd html 3.0//",
    "-//ietf//dtd html 3.2 final//",
    "-//ietf//dtd html 3.2//",
    "-//ietf//dtd html 3//",
    "-//ietf//dtd html level 0//",
    "-//ietf//dtd html level 1//",
    "-//ietf//dtd html level 2//",
    "-//ietf//dtd html level 3//",
    "-//ietf//dtd html strict level 0//",
    "-//ietf//dtd html strict level 1//",
    "-//ietf//dtd html strict level 2//",
    "-//ietf//dtd html strict level 3//",
    "-//ietf//dtd html strict//",
    "-//ietf//dtd html//",
    "-//metrius//dtd metrius presentational//",
    "-//microsoft//dtd internet explorer 2.0 html strict//",
    "-//microsoft//dtd internet explorer 2.0 html//",
    "-//microsoft//dtd internet explorer 2.0 tables//",
    "-//microsoft//dtd internet explorer 3.0 html strict//",
    "-//microsoft//dtd internet explorer 3.0 html//",
    "-//microsoft//dtd internet explorer 3.0 tables//",
    "-//netscape comm. corp.//dtd html//",
    "-//netscape comm. corp.//dtd strict html//",
    "-//o'reilly and associates//dtd html 2.0//",
    "-//o'reilly and associates//dtd html extended 1.0//",
    "-//o'reilly and associates//dtd html extended relaxed 1.0//",
    "-//sq//dtd html 2.0 hotmetal + extensions//",
    "-//softquad software//dtd hotmetal pro 6.0::19990601::extensions to html 4.0//",
    "-//softquad//dtd hotmetal pro 4.0::19971010::extensions to html 4.0//",
    "-//spyglass//dtd html 2.0 extended//",
    "-//sun microsystems corp.//dtd hotjava html//",
    "-//sun microsystems corp.//dtd hotjava strict html//",
    "-//w3c//dtd html 3 1995-03-24//",
    "-//w3c//dtd html 3.2 draft//",
    "-//w3c//dtd html 3.2 final//",
    "-//w3c//dtd html 3.2//",
    "-//w3c//dtd html 3.2s draft//",
    "-//w3c//dtd html 4.0 frameset//",
    "-//w3c//dtd html 4.0 transitional//",
    "-//w3c//dtd html experimental 19960712//",
    "-//w3c//dtd html experimental 970421//",
    "-//w3c//dtd w3 html//",
    "-//w3o//dtd w3 html 3.0//",
    "-//webtechs//dtd mozilla html 2.0//",
    "-//webtechs//dtd mozilla html//",
];

const QUIRKY_PUBLIC_PREFIXES_NO_SYSTEM: &[&str] =
    &["-//w3c//dtd html 4.01 frameset//", "-//w3c//dtd html 4.01 transitional//"];

const LIMITED_QUIRKS_PUBLIC_PREFIXES: &[&str] = &[
    "-//w3c//dtd xhtml 1.0 frameset//",
    "-//w3c//dtd xhtml 1.0 transitional//",
];

const LIMITED_QUIRKS_PUBLIC_PREFIXES_WITH_SYSTEM: &[&str] = &[
    "-//w3c//dtd html 4.01 frameset//",
    "-//w3c//dtd html 4.01 transitional//",
];

fn starts_with_any(haystack: &str, prefixes: &[&str]) -> bool {
    let lower = haystack.to_ascii_lowercase();
    prefixes.iter().any(|p| lower.starts_with(p))
}

/// Compute the quirks mode a doctype forces, given whether we're parsing an
/// `iframe srcdoc` document (which always forces no-quirks, spec.md §4.3).
pub fn doctype_error_and_quirks(doctype: &Doctype, iframe_srcdoc: bool) -> (bool, QuirksMode) {
    if iframe_srcdoc {
        return (doctype.force_quirks, QuirksMode::NoQuirks);
    }

    let name = doctype.name.as_deref().unwrap_or("");
    let public = doctype.public_id.as_deref().unwrap_or("");
    let system = doctype.system_id.as_deref().unwrap_or("");
    let public_lower = public.to_ascii_lowercase();

    let err = doctype.force_quirks
        || name != "html"
        || !public.is_empty()
        || (!system.is_empty() && system.to_ascii_lowercase() != "about:legacy-compat");

    if doctype.force_quirks
        || name != "html"
        || public_lower == "-//w3o//dtd w3 html strict 3.0//en//"
        || public_lower == "-/w3d/dtd html 4.0 transitional/en"
        || public_lower == "html"
        || starts_with_any(public, QUIRKY_PUBLIC_PREFIXES)
        || (system.is_empty() && starts_with_any(public, QUIRKY_PUBLIC_PREFIXES_NO_SYSTEM))
        || (!system.is_empty() && system.to_ascii_lowercase() == "http://www.ibm.com/data/dtd/v11/ibmxhtml1-transitional.dtd")
    {
        return (err, QuirksMode::Quirks);
    }

    if starts_with_any(public, LIMITED_QUIRKS_PUBLIC_PREFIXES)
        || (!system.is_empty() && starts_with_any(public, LIMITED_QUIRKS_PUBLIC_PREFIXES_WITH_SYSTEM))
    {
        return (err, QuirksMode::LimitedQuirks);
    }

    (err, QuirksMode::NoQuirks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tendril::SliceExt;

    fn dt(public: &str, system: &str) -> Doctype {
        Doctype {
            name: Some("html".to_tendril()),
            public_id: Some(public.to_tendril()),
            system_id: Some(system.to_tendril()),
            force_quirks: false,
        }
    }

    #[test]
    fn html32_public_id_is_quirks() {
        let (_, mode) = doctype_error_and_quirks(&dt("-//W3C//DTD HTML 3.2 Final//EN", ""), false);
        assert_eq!(mode, QuirksMode::Quirks);
    }

    #[test]
    fn xhtml_transitional_is_limited_quirks() {
        let (_, mode) =
            doctype_error_and_quirks(&dt("-//W3C//DTD XHTML 1.0 Transitional//EN", ""), false);
        assert_eq!(mode, QuirksMode::LimitedQuirks);
    }

    #[test]
    fn plain_html5_doctype_is_no_quirks() {
        let (err, mode) = doctype_error_and_quirks(&dt("", ""), false);
        assert_eq!(mode, QuirksMode::NoQuirks);
        assert!(!err);
    }

    #[test]
    fn iframe_srcdoc_always_no_quirks() {
        let (_, mode) =
            doctype_error_and_quirks(&dt("-//W3C//DTD HTML 3.2 Final//EN", ""), true);
        assert_eq!(mode, QuirksMode::NoQuirks);
    }
}
