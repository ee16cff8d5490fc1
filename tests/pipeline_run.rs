// tests/pipeline_run.rs
use linkage_lib::blocking::BlockingStrategy;
use linkage_lib::error::LinkageError;
use linkage_lib::evaluation::REPORT_FILE_NAME;
use linkage_lib::external::{align_predictions, export_candidates, predicted_matches, read_predictions};
use linkage_lib::io::ground_truth::{TEST_FILE, TRAIN_FILE, VAL_FILE};
use linkage_lib::io::{load_pairs, load_records, load_scored_pairs, write_ground_truth, write_pairs};
use linkage_lib::matching::{resolve, ClassifierKind, RuleWeights};
use linkage_lib::models::{CandidatePair, GroundTruthEntry, Source};
use linkage_lib::pipeline::{match_file_name, run_linkage};
use linkage_lib::rl::Model;
use linkage_lib::utils::config::{LinkageConfig, PathsConfig};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const TOYOTA: [&str; 10] = [
    "corolla", "camry", "rav4", "prius", "yaris", "highlander", "tacoma", "sequoia", "sienna", "venza",
];
const FORD: [&str; 10] = [
    "focus", "bronco", "mustang", "escape", "explorer", "ranger", "edge", "transit", "fiesta", "taurus",
];

fn write_fixture(dir: &Path) {
    let mut left = String::from("id_cl,make,model,year,fuel_type,transmission,body_type\n");
    let mut right = String::from("id_us,Make,Model,Year,fuel_type,transmission,body_type\n");
    for (i, (make, model)) in TOYOTA
        .iter()
        .map(|m| ("toyota", *m))
        .chain(FORD.iter().map(|m| ("ford", *m)))
        .enumerate()
    {
        left.push_str(&format!("{},{},{},2019,gasoline,automatic,sedan\n", i, make, model));
        right.push_str(&format!("{},{},{},2019.0,gasoline,automatic,sedan\n", 100 + i, make.to_uppercase(), model));
    }
    fs::write(dir.join("left.csv"), left).unwrap();
    fs::write(dir.join("right.csv"), right).unwrap();

    // left i matches right 100 + i; hand-split so scopes are known
    let truth = |range: std::ops::Range<u64>| -> Vec<GroundTruthEntry> {
        range.map(|i| GroundTruthEntry::new(i, 100 + i, 1)).collect()
    };
    let gt_dir = dir.join("gt");
    write_ground_truth(&gt_dir.join(TRAIN_FILE), &truth(0..12)).unwrap();
    write_ground_truth(&gt_dir.join(VAL_FILE), &truth(12..16)).unwrap();
    write_ground_truth(&gt_dir.join(TEST_FILE), &truth(16..20)).unwrap();
}

fn config(dir: &TempDir, classifier: ClassifierKind) -> LinkageConfig {
    LinkageConfig {
        classifier,
        workers: 2,
        paths: PathsConfig {
            left: dir.path().join("left.csv"),
            right: dir.path().join("right.csv"),
            gt_dir: dir.path().join("gt"),
            results_dir: dir.path().join("results"),
            models_dir: dir.path().join("models"),
        },
        ..LinkageConfig::default()
    }
}

#[tokio::test]
async fn rule_run_writes_matches_and_evaluates_in_scope() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let config = config(&dir, ClassifierKind::Rule);

    let summary = run_linkage(&config, None, None, false).await.unwrap();
    assert_eq!(summary.left_records, 20);
    assert_eq!(summary.right_records, 20);
    // two buckets of 10 x 10
    assert_eq!(summary.candidates, 200);
    assert_eq!(summary.scored_pairs, 200);
    assert_eq!(summary.accepted_matches, 20);
    assert_eq!(summary.score_threshold, 0.75);

    let report = summary.evaluation.clone().unwrap();
    assert_eq!((report.tp, report.fp, report.found), (4, 0, 4));
    assert_eq!(report.f1, 1.0);

    let written = load_scored_pairs(
        &config
            .paths
            .results_dir
            .join(match_file_name(ClassifierKind::Rule, BlockingStrategy::MakeYear)),
    )
    .unwrap();
    assert_eq!(written.len(), 20);
    assert!(written.iter().all(|p| p.pair.right_id.as_str() == format!("{}", 100 + p.pair.left_id.as_str().parse::<u64>().unwrap())));

    let run_files: Vec<_> = fs::read_dir(&config.paths.results_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("run_make_year_"))
        .collect();
    assert_eq!(run_files.len(), 1);
    assert!(!config.paths.results_dir.join(REPORT_FILE_NAME).exists());
}

#[tokio::test]
async fn configured_rule_weights_change_the_accepted_set() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    // right-side ford listings lose their model names
    let right: String = fs::read_to_string(dir.path().join("right.csv"))
        .unwrap()
        .lines()
        .map(|line| {
            let cols: Vec<&str> = line.split(',').collect();
            if cols[1] == "FORD" {
                format!("{},{},zzz,{}\n", cols[0], cols[1], cols[3..].join(","))
            } else {
                format!("{}\n", line)
            }
        })
        .collect();
    fs::write(dir.path().join("right.csv"), right).unwrap();

    let baseline = run_linkage(&config(&dir, ClassifierKind::Rule), None, None, false)
        .await
        .unwrap();
    assert_eq!(baseline.accepted_matches, 10);
    assert_eq!(baseline.evaluation.unwrap().tp, 0);

    let mut make_and_year = config(&dir, ClassifierKind::Rule);
    make_and_year.rule_weights = Some("make=1,year=1".parse::<RuleWeights>().unwrap());
    let overridden = run_linkage(&make_and_year, None, None, false).await.unwrap();
    assert_eq!(overridden.above_threshold, 200);
    assert_eq!(overridden.accepted_matches, 20);
    assert_eq!(overridden.evaluation.unwrap().tp, 4);
}

#[tokio::test]
async fn trained_run_trains_once_then_reuses_model() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let config = config(&dir, ClassifierKind::Trained);

    let first = run_linkage(&config, None, None, false).await.unwrap();
    let model_path = config.model_path();
    assert!(model_path.exists());
    let model = Model::load(&model_path, BlockingStrategy::MakeYear).unwrap();
    assert_eq!(first.score_threshold, model.threshold);
    let report = first.evaluation.unwrap();
    assert_eq!(report.recall, 1.0);
    assert_eq!(report.precision, 1.0);

    // without training truth the persisted model is reused
    fs::remove_file(config.train_truth_path()).unwrap();
    let second = run_linkage(&config, None, None, false).await.unwrap();
    assert_eq!(second.accepted_matches, first.accepted_matches);
    assert_eq!(Model::load(&model_path, BlockingStrategy::MakeYear).unwrap().fingerprint, model.fingerprint);
}

#[tokio::test]
async fn trained_classifier_without_model_or_truth_fails_before_work() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    fs::remove_file(dir.path().join("gt").join(TRAIN_FILE)).unwrap();
    let config = config(&dir, ClassifierKind::Trained);

    let err = run_linkage(&config, None, None, false).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LinkageError>(),
        Some(LinkageError::ModelRequired { .. })
    ));
    assert!(!config.paths.results_dir.exists());
}

#[tokio::test]
async fn missing_records_file_names_the_resource() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let mut config = config(&dir, ClassifierKind::Rule);
    config.paths.right = dir.path().join("absent.csv");

    let err = run_linkage(&config, None, None, false).await.unwrap_err();
    match err.downcast_ref::<LinkageError>() {
        Some(LinkageError::MissingInput { resource, path }) => {
            assert_eq!(resource, "R records");
            assert_eq!(path, &config.paths.right);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn external_predictions_reattach_by_position() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let left = load_records(&dir.path().join("left.csv"), Source::Left).unwrap();
    let right = load_records(&dir.path().join("right.csv"), Source::Right).unwrap();
    let candidates = vec![
        CandidatePair::new("0", "100"),
        CandidatePair::new("0", "101"),
        CandidatePair::new("1", "101"),
        CandidatePair::new("999", "100"),
    ];

    let lines_path = dir.path().join("external").join("candidates.txt");
    let ids_path = dir.path().join("external").join("ids.csv");
    let (written, stats) = export_candidates(&lines_path, &candidates, &left, &right).unwrap();
    write_pairs(&ids_path, &written).unwrap();
    assert_eq!((stats.written, stats.skipped), (3, 1));
    let lines = fs::read_to_string(&lines_path).unwrap();
    assert_eq!(lines.lines().count(), 3);
    assert!(lines.lines().next().unwrap().starts_with("COL make VAL toyota COL model VAL corolla"));

    // the external tool answered one line short
    let preds_path = dir.path().join("external").join("preds.jsonl");
    fs::write(
        &preds_path,
        "{\"match\": 1, \"match_confidence\": 0.97}\n{\"match\": 0, \"match_confidence\": 0.12}\n",
    )
    .unwrap();
    let aligned = align_predictions(load_pairs(&ids_path).unwrap(), read_predictions(&preds_path).unwrap());
    assert_eq!(aligned.len(), 2);
    let matches = resolve(predicted_matches(aligned));
    assert_eq!(matches.len(), 1);
    assert_eq!(matches.pairs()[0].pair, CandidatePair::new("0", "100"));
    assert_eq!(matches.pairs()[0].score, 0.97);
}
