/*!
 * Tests for language utility functions
 */

use lingotrack::language_utils::{get_language_name, language_codes_match, normalize_to_part1_or_part2t, normalize_to_part2t};
use lingotrack::job::Job;

/// Test normalization of language codes to ISO 639-2/T format
#[test]
fn test_normalize_to_part2t_withValidCodes_shouldNormalizeCorrectly() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
    assert_eq!(normalize_to_part2t(" EN ").unwrap(), "eng");
}

/// Test normalization to the short form stored on jobs
#[test]
fn test_normalize_to_part1_or_part2t_shouldPreferTwoLetters() {
    assert_eq!(normalize_to_part1_or_part2t("deu").unwrap(), "de");
    assert_eq!(normalize_to_part1_or_part2t("dut").unwrap(), "nl");
    assert!(normalize_to_part1_or_part2t("e").is_err());
}

/// Test matching of different language code formats
#[test]
fn test_language_codes_match_withMatchingCodes_shouldReturnTrue() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("fre", "fr"));
    assert!(!language_codes_match("en", "fr"));
}

/// Test language names
#[test]
fn test_get_language_name_withValidCode_shouldReturnName() {
    assert_eq!(get_language_name("fr").unwrap(), "French");
    assert!(get_language_name("qq").is_err());
}

/// Test that jobs store normalized languages
#[test]
fn test_job_new_withLongCodes_shouldStoreShortCodes() {
    let job = Job::new("eng", "fre").unwrap();
    assert_eq!(job.source_language, "en");
    assert_eq!(job.target_language, "fr");
}
