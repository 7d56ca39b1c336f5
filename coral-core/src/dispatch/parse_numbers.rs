use crate::command::{CommandReply, ErrorCode};

/// Parses a decimal signed integer argument.
pub(super) fn parse_int(arg: &[u8]) -> Result<i64, CommandReply> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| CommandReply::Err(ErrorCode::BadArg, "expected an integer".to_owned()))
}

/// Parses a finite-or-infinite score argument. NaN has no place in a total order.
pub(super) fn parse_score(arg: &[u8]) -> Result<f64, CommandReply> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|score| !score.is_nan())
        .ok_or_else(|| CommandReply::Err(ErrorCode::BadArg, "expected a number".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::{parse_int, parse_score};
    use googletest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"0", 0)]
    #[case(b"-42", -42)]
    #[case(b"9223372036854775807", i64::MAX)]
    fn integers_parse(#[case] input: &[u8], #[case] expected: i64) {
        assert_that!(&parse_int(input), eq(&Ok(expected)));
    }

    #[rstest]
    #[case(b"" as &[u8])]
    #[case(b"1.5")]
    #[case(b"ten")]
    #[case(b"\xFF\xFE")]
    fn non_integers_are_rejected(#[case] input: &[u8]) {
        assert_that!(parse_int(input).is_err(), eq(true));
    }

    #[rstest]
    fn scores_parse_but_nan_is_rejected() {
        assert_that!(&parse_score(b"1.25"), eq(&Ok(1.25)));
        assert_that!(&parse_score(b"-inf"), eq(&Ok(f64::NEG_INFINITY)));
        assert_that!(parse_score(b"nan").is_err(), eq(true));
        assert_that!(parse_score(b"score").is_err(), eq(true));
    }
}
