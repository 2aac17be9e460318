//! End-to-end tests: workbook and raw logs on disk through to the output CSV

use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use trial_prep::config::{AnswerSource, PipelineConfig, TrialNumberSource};
use trial_prep::{DatasetPipeline, PrepError, StimulusCatalog, OUTPUT_COLUMNS};

const CATALOG_HEADER: [&str; 9] = [
    "ItemNo", "QFile", "ACondition", "Aplaus", "Anumber", "Qnumber", "Question", "Answer", "QLSA",
];

struct StimulusFixture {
    item: f64,
    qfile: &'static str,
    condition: &'static str,
    plaus: f64,
    anumber: f64,
    qnumber: f64,
    question: &'static str,
    answer: &'static str,
    qlsa: f64,
}

fn write_catalog(path: &Path) {
    let sheets = [
        (
            "List 1a",
            vec![
                StimulusFixture {
                    item: 3.0,
                    qfile: "3P.wav",
                    condition: "Congruent",
                    plaus: 4.5,
                    anumber: 12.0,
                    qnumber: 3.0,
                    question: "Which clock tower stands in London?",
                    answer: "Big Ben",
                    qlsa: 0.5,
                },
                StimulusFixture {
                    item: 4.0,
                    qfile: "4U.wav",
                    condition: "Incongruent",
                    plaus: 1.5,
                    anumber: 40.0,
                    qnumber: 4.0,
                    question: "Where do polar bears not live?",
                    answer: "The North Pole",
                    qlsa: 0.25,
                },
            ],
        ),
        (
            "List 2b",
            vec![StimulusFixture {
                item: 33.0,
                qfile: "3P.wav",
                condition: "Congruent",
                plaus: 4.0,
                anumber: 7.0,
                qnumber: 3.0,
                question: "What is the capital of France?",
                answer: "Paris",
                qlsa: 0.75,
            }],
        ),
    ];

    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name).unwrap();
        for (col, header) in CATALOG_HEADER.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        for (idx, spec) in rows.iter().enumerate() {
            let row = idx as u32 + 1;
            sheet.write_number(row, 0, spec.item).unwrap();
            sheet.write_string(row, 1, spec.qfile).unwrap();
            sheet.write_string(row, 2, spec.condition).unwrap();
            sheet.write_number(row, 3, spec.plaus).unwrap();
            sheet.write_number(row, 4, spec.anumber).unwrap();
            sheet.write_number(row, 5, spec.qnumber).unwrap();
            sheet.write_string(row, 6, spec.question).unwrap();
            sheet.write_string(row, 7, spec.answer).unwrap();
            sheet.write_number(row, 8, spec.qlsa).unwrap();
        }
    }
    workbook.save(path).unwrap();
}

/// `(trial_type, node trial, stimulus, responses)`
type LogRow<'a> = (&'a str, u32, &'a str, &'a str);

fn write_log(path: &Path, subject: &str, rows: &[LogRow]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer
        .write_record([
            "subject",
            "trial_type",
            "trial_index",
            "time_elapsed",
            "internal_node_id",
            "stimulus",
            "responses",
        ])
        .unwrap();
    for (position, (trial_type, trial, stimulus, responses)) in rows.iter().enumerate() {
        writer
            .write_record([
                subject.to_string(),
                trial_type.to_string(),
                position.to_string(),
                (position * 1000).to_string(),
                format!("0.0-{}.0", trial),
                stimulus.to_string(),
                responses.to_string(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
}

struct Fixture {
    _dir: TempDir,
    catalog: PathBuf,
    input_dir: PathBuf,
    output: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("Stimulus_List.xlsx");
        let input_dir = dir.path().join("raw");
        let output = dir.path().join("transformed_dprime.csv");
        fs::create_dir(&input_dir).unwrap();

        write_catalog(&catalog);
        write_log(
            &input_dir.join("List_1a_PP_p01.csv"),
            "p01",
            &[
                ("single-audio", 0, "stim/questions/3P.mp3", ""),
                ("single-audio", 1, "stim/answers/Big_Ben.mp3", ""),
                ("survey-text", 2, "", r#"{"Q0":"Big Ben"}"#),
                ("survey-text", 3, "", r#"{"Q0":"25","Q1":"F"}"#),
                ("survey-text", 4, "", r#"{"Q0":"again"}"#),
                ("single-audio", 5, "stim/questions/4U.mp3", ""),
                ("single-audio", 6, "stim/answers/North Pole.mp3", ""),
                ("survey-text", 7, "", r#"{"Q0":"north pole"}"#),
                ("survey-text", 8, "", "not json"),
            ],
        );
        write_log(
            &input_dir.join("List_2b_PP_p02.csv"),
            "p02",
            &[
                ("survey-text", 0, "", r#"{"Q0":"early"}"#),
                ("single-audio", 55, "stim/questions/3P.mp3", ""),
                ("single-audio", 56, "stim/answers/Paris.mp3", ""),
                ("survey-text", 57, "", r#"{"Q0":"paris"}"#),
            ],
        );
        fs::write(input_dir.join("README.txt"), "not a log").unwrap();

        Self {
            _dir: dir,
            catalog,
            input_dir,
            output,
        }
    }

    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.paths.catalog = self.catalog.clone();
        config.paths.input_dir = self.input_dir.clone();
        config.paths.output = self.output.clone();
        config
    }
}

#[test]
fn test_full_run_writes_expected_table() {
    let fixture = Fixture::new();
    let report = DatasetPipeline::new(fixture.config()).unwrap().run().unwrap();

    let written = fs::read_to_string(&fixture.output).unwrap();
    let expected = [
        OUTPUT_COLUMNS.join(","),
        "3,p01,0,Congruent,4.5,Big_Ben,1,12,1a,Predictable,3P,3,Which clock tower stands in London?,Big Ben,2,0.5,Big Ben,,,,1,,,,,".to_string(),
        "4,p01,1,Incongruent,1.5,The North Pole,2,40,1a,Unpredictable,4U,4,Where do polar bears not live?,The North Pole,3,0.25,north pole,,,,1,,,,,".to_string(),
        "33,p02,11,Congruent,4,Paris,1,7,2b,Predictable,3P,3,What is the capital of France?,Paris,1,0.75,paris,,,,3,,,,,".to_string(),
    ]
    .join("\n")
        + "\n";
    assert_eq!(written, expected);

    assert_eq!(report.catalog_lists, vec!["1a".to_string(), "2b".to_string()]);
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.files[0].list, "1a");
    assert_eq!(report.files[0].stats.demographic, 1);
    assert_eq!(report.files[0].stats.malformed, 1);
    assert_eq!(report.files[0].stats.emitted, 3);
    assert_eq!(report.files[1].stats.no_audio_pair, 1);
    assert_eq!(report.extracted(), 4);
    assert_eq!(report.assembly.filtered_rows, 1);
    assert_eq!(report.dropped_unmatched, 1);
    assert_eq!(report.rows, 3);
    assert_eq!(report.columns, 26);
    assert_eq!(report.trial_range, Some((0, 11)));
    assert_eq!(report.blocks.get(&1), Some(&2));
    assert_eq!(report.blocks.get(&2), None);
    assert_eq!(report.blocks.get(&3), Some(&1));
}

#[test]
fn test_rerun_is_byte_identical() {
    let fixture = Fixture::new();
    let pipeline = DatasetPipeline::new(fixture.config()).unwrap();

    pipeline.run().unwrap();
    let first = fs::read(&fixture.output).unwrap();
    pipeline.run().unwrap();
    let second = fs::read(&fixture.output).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_emitted_stimuli_resolve_in_own_list() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let catalog = StimulusCatalog::load(&config.paths.catalog, &config.catalog).unwrap();
    let pipeline = DatasetPipeline::new(config).unwrap();
    let logs = pipeline.read_inputs().unwrap();
    let (parsed, dataset) = pipeline.process(&catalog, &logs).unwrap();

    for record in parsed.iter().flat_map(|p| p.records.iter()) {
        assert!(catalog.lookup(&record.list, &record.q_file).is_some());
        assert_ne!(record.response, "25");
    }
    for record in &dataset.records {
        let block = record.block.unwrap();
        let expected = if record.trial <= 5 {
            1
        } else if record.trial <= 10 {
            2
        } else {
            3
        };
        assert_eq!(block, expected);
    }
}

#[test]
fn test_inspect_writes_nothing() {
    let fixture = Fixture::new();
    let report = DatasetPipeline::new(fixture.config())
        .unwrap()
        .inspect()
        .unwrap();

    assert_eq!(report.rows, 3);
    assert_eq!(report.output, None);
    assert!(!fixture.output.exists());
}

#[test]
fn test_toml_config_with_lookup_table() {
    let fixture = Fixture::new();
    let toml = format!(
        r#"
        [paths]
        catalog = {catalog:?}
        input_dir = {input_dir:?}
        output = {output:?}

        [log]
        trial_number = "node-id"

        [answer_source]
        kind = "lookup-table"

        [answer_source.answers]
        3P = "Big Ben clock tower"
        "#,
        catalog = fixture.catalog.display().to_string(),
        input_dir = fixture.input_dir.display().to_string(),
        output = fixture.output.display().to_string(),
    );
    let config = PipelineConfig::from_toml_str(&toml).unwrap();
    assert_eq!(config.log.trial_number, TrialNumberSource::NodeId);
    assert!(matches!(config.answer_source, AnswerSource::LookupTable { .. }));

    let report = DatasetPipeline::new(config).unwrap().run().unwrap();
    assert_eq!(report.rows, 3);

    let written = fs::read_to_string(&fixture.output).unwrap();
    let mut reader = csv::Reader::from_reader(written.as_bytes());
    let expected_answers: Vec<(String, String)> = reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[13].to_string(), r[14].to_string())
        })
        .collect();
    assert_eq!(
        expected_answers,
        vec![
            ("Big Ben clock tower".to_string(), "4".to_string()),
            (String::new(), "0".to_string()),
            ("Big Ben clock tower".to_string(), "4".to_string()),
        ]
    );
}

#[test]
fn test_no_inputs_is_fatal() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.paths.input_glob = "Session_*.csv".to_string();

    let result = DatasetPipeline::new(config).unwrap().run();
    assert!(matches!(result, Err(PrepError::NoInputFiles { .. })));
    assert!(!fixture.output.exists());
}
