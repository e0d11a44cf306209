// src/series/tests.rs

use super::*;

fn close(a: Complex64, b: Complex64, tol: f64) -> bool {
    (a - b).norm() <= tol * (1.0 + b.norm())
}

fn take(source: &mut impl TermSource, n: usize) -> Vec<Term> {
    (0..n).map(|_| source.next_term()).collect()
}

#[test_log::test]
fn it_should_parse_function_names_and_expressions() {
    assert_eq!("exp".parse::<SeriesFunction>().unwrap(), SeriesFunction::Exp);
    assert_eq!("exp(z)".parse::<SeriesFunction>().unwrap(), SeriesFunction::Exp);
    assert_eq!("1 / (1 - z)".parse::<SeriesFunction>().unwrap(), SeriesFunction::Geometric);
    assert_eq!("SIN(z)".parse::<SeriesFunction>().unwrap(), SeriesFunction::Sin);
    assert_eq!("cos".parse::<SeriesFunction>().unwrap(), SeriesFunction::Cos);
    assert_eq!("log(1+z)".parse::<SeriesFunction>().unwrap(), SeriesFunction::Log1p);
    assert_eq!(
        "tan(z)".parse::<SeriesFunction>(),
        Err(SeriesError::UnknownFunction("tan(z)".to_string()))
    );
}

#[test_log::test]
fn it_should_round_trip_function_names_through_display() {
    for f in [
        SeriesFunction::Exp,
        SeriesFunction::Geometric,
        SeriesFunction::Sin,
        SeriesFunction::Cos,
        SeriesFunction::Log1p,
    ] {
        assert_eq!(f.to_string().parse::<SeriesFunction>().unwrap(), f);
    }
}

#[test_log::test]
fn it_should_parse_complex_literals_with_i_or_j() {
    assert_eq!(parse_complex("1+1.5j").unwrap(), Complex64::new(1.0, 1.5));
    assert_eq!(parse_complex(" 1+1.5i ").unwrap(), Complex64::new(1.0, 1.5));
    assert_eq!(parse_complex("2").unwrap(), Complex64::new(2.0, 0.0));
    assert_eq!(parse_complex("-0.5j").unwrap(), Complex64::new(0.0, -0.5));
    assert_eq!(
        parse_complex("one"),
        Err(SeriesError::InvalidComplex("one".to_string()))
    );
}

#[test_log::test]
fn it_should_generate_exponential_terms_about_zero() {
    let mut series = TaylorSeries::new(SeriesFunction::Exp, Complex64::new(0.0, 0.0), Complex64::new(2.0, 0.0));
    let terms = take(&mut series, 5);
    let expected = [1.0, 2.0, 2.0, 4.0 / 3.0, 2.0 / 3.0];
    for (term, want) in terms.iter().zip(expected) {
        assert!(close(*term, Complex64::new(want, 0.0), 1e-15), "{} vs {}", term, want);
    }
    assert_eq!(series.terms_produced(), 5);
}

#[test_log::test]
fn it_should_generate_geometric_terms_about_a_shifted_base() {
    // 1/(1-z) about a = 0.5: coefficients 2^(n+1), times (z0 - a)^n.
    let a = Complex64::new(0.5, 0.0);
    let z0 = Complex64::new(0.75, 0.0);
    let mut series = TaylorSeries::new(SeriesFunction::Geometric, a, z0);
    let terms = take(&mut series, 4);
    let expected = [2.0, 1.0, 0.5, 0.25];
    for (term, want) in terms.iter().zip(expected) {
        assert!(close(*term, Complex64::new(want, 0.0), 1e-15));
    }
}

#[test_log::test]
fn it_should_track_the_partial_sum_of_produced_terms() {
    let mut series = TaylorSeries::new(SeriesFunction::Cos, Complex64::new(0.0, 0.0), Complex64::new(0.3, 0.2));
    let terms = take(&mut series, 6);
    let sum: Complex64 = terms.iter().sum();
    assert_eq!(series.partial_sum(), sum);
}

#[test_log::test]
fn it_should_converge_to_the_function_value_inside_the_disc() {
    let cases = [
        (SeriesFunction::Exp, Complex64::new(0.0, 0.0), Complex64::new(1.0, 1.5)),
        (SeriesFunction::Exp, Complex64::new(0.2, -0.1), Complex64::new(0.5, 0.5)),
        (SeriesFunction::Geometric, Complex64::new(0.1, 0.1), Complex64::new(-0.3, 0.2)),
        (SeriesFunction::Sin, Complex64::new(0.3, 0.0), Complex64::new(0.1, 0.8)),
        (SeriesFunction::Cos, Complex64::new(-0.2, 0.4), Complex64::new(0.6, 0.1)),
        (SeriesFunction::Log1p, Complex64::new(0.1, 0.0), Complex64::new(0.3, 0.2)),
    ];
    for (function, a, z0) in cases {
        let mut series = TaylorSeries::new(function, a, z0);
        take(&mut series, 200);
        assert!(
            close(series.partial_sum(), function.evaluate(z0), 1e-10),
            "{} about {} at {}: {} vs {}",
            function,
            a,
            z0,
            series.partial_sum(),
            function.evaluate(z0)
        );
    }
}

#[test_log::test]
fn it_should_accept_closures_as_term_sources() {
    let mut n = 0.0;
    let mut counter = || {
        n += 1.0;
        Complex64::new(n, 0.0)
    };
    let terms = take(&mut counter, 3);
    assert_eq!(
        terms,
        vec![
            Complex64::new(1.0, 0.0),
            Complex64::new(2.0, 0.0),
            Complex64::new(3.0, 0.0)
        ]
    );
}

#[test_log::test]
fn it_should_keep_long_entire_series_finite() {
    let z0 = Complex64::new(1.0, 1.5);
    for function in [SeriesFunction::Exp, SeriesFunction::Sin, SeriesFunction::Cos] {
        let mut series = TaylorSeries::new(function, Complex64::new(0.0, 0.0), z0);
        let terms = take(&mut series, 2000);
        assert!(
            terms.iter().all(|t| t.is_finite()),
            "{} produced a non-finite term",
            function
        );
        assert!(close(series.partial_sum(), function.evaluate(z0), 1e-12));
    }
}
