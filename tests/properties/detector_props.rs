//! Properties of the base detector: no panics on arbitrary input, spans
//! always index back into the text, redaction removes every detection.

use proptest::prelude::*;

use cardguard::detector::{self, RedactMode};

proptest! {
    #[test]
    fn scan_never_panics(text in ".{0,256}") {
        let _ = detector::scan(&text);
    }

    #[test]
    fn luhn_never_panics(digits in ".{0,64}") {
        let _ = detector::luhn_check(&digits);
    }

    #[test]
    fn detection_spans_index_into_text(text in "[0-9 \\-a-z]{0,128}") {
        for d in detector::scan(&text) {
            prop_assert!(d.start < d.end);
            prop_assert_eq!(&text[d.start..d.end], d.raw.as_str());
        }
    }

    #[test]
    fn redact_removes_every_detected_span(text in "[0-9 \\-a-z]{0,128}") {
        let detections = detector::scan(&text);
        let redacted = detector::redact(&text, &detections, RedactMode::Redact);
        // No detected raw text survives redaction
        for d in &detections {
            prop_assert!(!redacted.contains(&d.raw));
        }
    }

    #[test]
    fn mask_keeps_at_most_last_four_digits(digits in "[0-9]{13,19}") {
        let detections = detector::scan(&digits);
        prop_assume!(!detections.is_empty());
        let masked = detector::redact(&digits, &detections, RedactMode::Mask);
        let kept: usize = masked.chars().filter(char::is_ascii_digit).count();
        prop_assert!(kept <= 4);
    }

    #[test]
    fn dedup_never_grows(text in "[0-9 ]{0,128}") {
        let detections = detector::scan(&text);
        let doubled: Vec<_> = detections.iter().chain(detections.iter()).cloned().collect();
        prop_assert_eq!(detector::dedup_spans(doubled).len(), detections.len());
    }
}
