use semfit::analysis::MODEL_DESC;
use semfit::data::sample::{LOADINGS, PATHS, simulate};
use semfit::sem::{FitOptions, Model, calc_stats, inspect};

fn fit(rows: usize, seed: u64) -> semfit::sem::FittedModel {
    let dataset = simulate(rows, seed);
    Model::new(MODEL_DESC)
        .unwrap()
        .fit(&dataset, &FitOptions::default())
        .expect("model converges on simulated data")
}

#[test]
fn recovers_population_loadings_and_paths() {
    let fitted = fit(3000, 11);

    for (indicator, factor, loading) in LOADINGS {
        let est = fitted.estimate(indicator, "~", factor).unwrap();
        assert!(
            (est - loading).abs() < 0.12,
            "{indicator} ~ {factor}: estimated {est}, population {loading}"
        );
    }
    for (dep, reg, coef) in PATHS {
        let est = fitted.estimate(dep, "~", reg).unwrap();
        assert!(
            (est - coef).abs() < 0.15,
            "{dep} ~ {reg}: estimated {est}, population {coef}"
        );
    }
    let var = fitted.estimate("将来に対する関心", "~~", "将来に対する関心").unwrap();
    assert!((var - 1.0).abs() < 0.15, "factor variance {var}");
}

#[test]
fn estimates_table_marks_fixed_loadings() {
    let fitted = fit(500, 42);
    let rows = inspect(&fitted);
    assert_eq!(rows.len(), fitted.model.params.len());

    let fixed = rows
        .iter()
        .find(|r| r.lval == "V10" && r.rval == "InterestInGrad")
        .unwrap();
    assert_eq!(fixed.estimate, 1.0);
    assert_eq!(fixed.std_err, None);

    for row in rows.iter().filter(|r| r.std_err.is_some()) {
        let se = row.std_err.unwrap();
        assert!(se.is_finite() && se > 0.0, "{} {} {}: se {se}", row.lval, row.op, row.rval);
        let p = row.p_value.unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    let first_cov = rows.iter().position(|r| r.op == "~~").unwrap();
    assert!(rows[..first_cov].iter().all(|r| r.op == "~"));
}

#[test]
fn correct_model_fits_well() {
    let fitted = fit(2000, 5);
    let stats = calc_stats(&fitted);
    assert_eq!(stats.dof, 24.0);
    assert_eq!(stats.dof_baseline, 36.0);
    assert!(stats.chi2 >= 0.0);
    assert!(stats.chi2_baseline > stats.chi2);
    assert!(stats.cfi > 0.98 && stats.cfi <= 1.0, "CFI {}", stats.cfi);
    assert!(stats.rmsea >= 0.0 && stats.rmsea < 0.05, "RMSEA {}", stats.rmsea);
    assert!(stats.gfi > 0.95 && stats.gfi <= 1.0, "GFI {}", stats.gfi);
    assert!(stats.nfi > 0.95);
    assert!(stats.tli > 0.95);
    assert!(stats.loglik < 0.0);
    assert!(stats.bic > stats.aic);
    assert!(stats.chi2_p_value > 0.0 && stats.chi2_p_value <= 1.0);
}

#[test]
fn misspecified_model_fits_worse() {
    let dataset = simulate(2000, 5);
    let wrong = "
        F =~ V10 + V11 + V4 + V5 + V7 + V9 + V1 + V2 + V6
    ";
    let fitted = Model::new(wrong)
        .unwrap()
        .fit(&dataset, &FitOptions::default())
        .unwrap();
    let stats = calc_stats(&fitted);
    assert_eq!(stats.dof, 27.0);
    assert!(stats.chi2_p_value < 0.001);
    assert!(stats.rmsea > 0.05, "RMSEA {}", stats.rmsea);
}

#[test]
fn refitting_is_deterministic() {
    let a = fit(400, 9);
    let b = fit(400, 9);
    assert_eq!(a.estimates, b.estimates);
    assert_eq!(a.iterations, b.iterations);
}
