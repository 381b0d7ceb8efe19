use tmask::classify::{
    classify_pixel, fit_models, preprocess, ClassifierConfig, DecisionRule, Label, Observation,
};

const START: i64 = 735_000;

/// Small deterministic jitter in [-25, 25].
fn jitter(i: usize) -> f64 {
    5.0 * (((i * 7) % 11) as f64 - 5.0)
}

fn flat(n: usize) -> Vec<Observation> {
    (0..n)
        .map(|i| Observation::new(START + 16 * i as i64, 1000.0, 3000.0, 2000.0))
        .collect()
}

fn noisy(n: usize) -> Vec<Observation> {
    (0..n)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * (16 * i) as f64 / 365.0;
            Observation::new(
                START + 16 * i as i64,
                800.0 + 200.0 * phase.sin() + jitter(i),
                3000.0 + 800.0 * phase.sin() + jitter(i + 3),
                1800.0 + 400.0 * phase.sin() + jitter(i + 5),
            )
        })
        .collect()
}

fn flagged(labels: &[Label]) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_contaminated())
        .map(|(i, _)| i)
        .collect()
}

fn with_threshold(threshold: f64) -> ClassifierConfig {
    ClassifierConfig {
        threshold,
        ..ClassifierConfig::default()
    }
}

#[test]
fn output_length_matches_input() {
    for n in [0, 1, 5, 11, 12, 13, 30, 70] {
        let mut series = noisy(n);
        for i in (0..n).step_by(4) {
            series[i].nir = 0.0;
        }
        assert_eq!(classify_pixel(&series, &ClassifierConfig::default()).len(), n);
    }
}

#[test]
fn dropped_dates_are_always_clear() {
    let mut series = noisy(40);
    let dropped = [0, 5, 17, 39];
    for &i in &dropped {
        series[i].green = 0.0;
        // Extreme in the other bands; must not matter.
        series[i].nir = 90_000.0;
        series[i].swir1 = f64::NAN;
    }
    for threshold in [0.0, 1.0, 40.0] {
        let labels = classify_pixel(&series, &with_threshold(threshold));
        for &i in &dropped {
            assert_eq!(labels[i], Label::Clear, "threshold {threshold}, date {i}");
        }
    }
}

#[test]
fn eleven_valid_dates_are_all_clear() {
    let mut series = flat(14);
    series[2].swir1 = 0.0;
    series[9].nir = 0.0;
    series[12].green = 0.0;
    series[6].green = 10_000.0;
    assert_eq!(preprocess(&series).len(), 11);

    let labels = classify_pixel(&series, &ClassifierConfig::default());
    assert!(labels.iter().all(|l| *l == Label::Clear));
}

#[test]
fn twelve_valid_dates_are_screened() {
    let mut series = flat(12);
    series[5].green = 10_000.0;
    series[6].nir = 40_000.0;

    let labels = classify_pixel(&series, &ClassifierConfig::default());
    assert_eq!(flagged(&labels), vec![5, 6]);
}

#[test]
fn raising_the_threshold_never_adds_flags() {
    let mut series = noisy(60);
    series[10].green += 2500.0;
    series[22].nir *= 0.4;
    series[22].swir1 *= 0.4;
    series[31].swir1 += 150.0;
    series[45].green += 120.0;

    for rule in [DecisionRule::Magnitude, DecisionRule::SignPattern] {
        let mut previous = usize::MAX;
        for threshold in [0.0, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0, 40.0, 100.0, 1e9] {
            let config = ClassifierConfig {
                threshold,
                rule,
                ..ClassifierConfig::default()
            };
            let count = flagged(&classify_pixel(&series, &config)).len();
            assert!(count <= previous, "{rule:?}: {count} > {previous} at {threshold}");
            previous = count;
        }
        assert_eq!(previous, 0);
    }
}

#[test]
fn repeated_runs_agree() {
    let mut series = noisy(50);
    series[13].green += 3000.0;
    series[20].nir = 0.0;
    let config = ClassifierConfig::default();

    let first = classify_pixel(&series, &config);
    for _ in 0..5 {
        assert_eq!(classify_pixel(&series, &config), first);
    }
}

#[test]
fn input_is_left_untouched() {
    let mut series = noisy(20);
    series[3].swir1 = 0.0;
    let before = series.clone();
    classify_pixel(&series, &ClassifierConfig::default());
    assert_eq!(series, before);
}

#[test]
fn scenario_a_single_outlier_in_flat_series() {
    for band in 0..3 {
        let mut series = flat(15);
        match band {
            0 => series[7].green *= 10.0,
            1 => series[7].nir *= 10.0,
            _ => series[7].swir1 *= 10.0,
        }
        let labels = classify_pixel(&series, &ClassifierConfig::default());
        assert_eq!(flagged(&labels), vec![7], "outlier in band {band}");
    }
}

#[test]
fn outliers_on_first_and_last_dates_are_flagged() {
    for n in [12, 13] {
        for at in [0, n - 1] {
            let mut series = flat(n);
            series[at].green = 10_000.0;
            let labels = classify_pixel(&series, &ClassifierConfig::default());
            assert_eq!(flagged(&labels), vec![at], "n {n}, outlier at {at}");
        }
    }
}

/// Integer reflectance with a few ±1-2 unit wiggles; most residuals tie.
fn quantised(n: usize) -> Vec<Observation> {
    const WIGGLE: [f64; 24] = [
        0.0, 1.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0, -2.0, 1.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0, 0.0,
        2.0, 0.0, -1.0, 0.0, 0.0, 1.0, 0.0,
    ];
    (0..n)
        .map(|i| {
            Observation::new(
                START + 16 * i as i64,
                800.0 + WIGGLE[i % 24],
                3000.0 + WIGGLE[(i + 5) % 24],
                2000.0 + WIGGLE[(i + 11) % 24],
            )
        })
        .collect()
}

#[test]
fn quantised_series_flags_only_the_cloud() {
    for n in [15, 24, 30] {
        let config = ClassifierConfig::default();
        assert!(flagged(&classify_pixel(&quantised(n), &config)).is_empty(), "n {n}");

        let mut series = quantised(n);
        series[9].green += 3000.0;
        series[9].nir += 1000.0;
        series[9].swir1 += 1000.0;
        assert_eq!(flagged(&classify_pixel(&series, &config)), vec![9], "n {n}");
    }
}

#[test]
fn rounded_seasonal_series_is_clear() {
    let mut series: Vec<Observation> = (0..69)
        .map(|i| {
            let date = 16 * i as i64;
            let phase = 2.0 * std::f64::consts::PI * date as f64 / 365.25;
            Observation::new(
                START + date,
                (800.0 + 200.0 * phase.sin()).round(),
                (3000.0 + 800.0 * phase.cos()).round(),
                (1800.0 + 400.0 * phase.sin()).round(),
            )
        })
        .collect();
    let config = ClassifierConfig::default();
    assert!(flagged(&classify_pixel(&series, &config)).is_empty());

    series[40].green += 2500.0;
    assert_eq!(flagged(&classify_pixel(&series, &config)), vec![40]);
}

#[test]
fn scenario_b_short_series_is_clear() {
    let series = vec![
        Observation::new(START, 10.0, 9000.0, 1.0),
        Observation::new(START + 16, 8000.0, 5.0, 7000.0),
        Observation::new(START + 32, 1.0, 1.0, 1.0),
        Observation::new(START + 48, 9999.0, 9999.0, 9999.0),
        Observation::new(START + 64, 42.0, 4200.0, 420.0),
    ];
    assert_eq!(
        classify_pixel(&series, &with_threshold(0.0)),
        vec![Label::Clear; 5]
    );
}

#[test]
fn scenario_c_every_date_missing_a_band() {
    let series: Vec<Observation> = flat(20)
        .into_iter()
        .enumerate()
        .map(|(i, mut o)| {
            match i % 3 {
                0 => o.green = 0.0,
                1 => o.nir = 0.0,
                _ => o.swir1 = 0.0,
            }
            o
        })
        .collect();
    assert!(preprocess(&series).is_empty());
    assert_eq!(
        classify_pixel(&series, &ClassifierConfig::default()),
        vec![Label::Clear; 20]
    );
}

#[test]
fn scenario_d_coverage_sets_model_complexity() {
    let doys: Vec<i64> = (0..20).map(|i| 15 * i).collect();
    let value = |doy: i64, i: usize, base: f64, amplitude: f64| {
        base + amplitude * (2.0 * std::f64::consts::PI * doy as f64 / 365.0).sin() + jitter(i)
    };
    let year = |offset: i64| -> Vec<Observation> {
        doys.iter()
            .enumerate()
            .map(|(i, &doy)| {
                Observation::new(
                    736_000 + offset + doy,
                    value(doy, i, 800.0, 200.0),
                    value(doy, i, 3000.0, 800.0),
                    value(doy, i, 1800.0, 400.0),
                )
            })
            .collect()
    };

    let short = year(0);
    let long: Vec<Observation> = (0..3).flat_map(|y| year(365 * y)).collect();
    let config = ClassifierConfig::default();

    let short_models = fit_models(&preprocess(&short), &config).expect("short fit");
    let long_models = fit_models(&preprocess(&long), &config).expect("long fit");
    // Under a year of coverage: trend only.
    assert_eq!(short_models.green.design.n_terms(), 2);
    assert_eq!(long_models.green.design.n_terms(), 8);

    assert!(flagged(&classify_pixel(&short, &config)).is_empty());
    assert!(flagged(&classify_pixel(&long, &config)).is_empty());

    // The richer model still catches a genuine cloud.
    let mut cloudy = long.clone();
    cloudy[30].green += 3000.0;
    cloudy[30].nir += 1500.0;
    cloudy[30].swir1 += 1500.0;
    assert_eq!(flagged(&classify_pixel(&cloudy, &config)), vec![30]);
}

#[test]
fn sign_pattern_flags_clouds_and_shadows_only() {
    let mut series = noisy(40);
    series[8].green += 2500.0; // cloud
    series[16].nir *= 0.1; // shadow
    series[16].swir1 *= 0.1;
    series[24].swir1 += 2500.0; // bright SWIR alone: not a recognised pattern

    let config = ClassifierConfig {
        rule: DecisionRule::SignPattern,
        ..ClassifierConfig::default()
    };
    assert_eq!(flagged(&classify_pixel(&series, &config)), vec![8, 16]);
    assert_eq!(
        flagged(&classify_pixel(&series, &ClassifierConfig::default())),
        vec![8, 16, 24]
    );
}
