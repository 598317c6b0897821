mod common;

use std::sync::atomic::Ordering;

use common::{day, file_names, read_json, snapshot, Fixture, Harness};
use paperdigest_common::DigestError;
use paperdigest_pipeline::checkpoint::{DOWNLOADED, FILTER_INSTITUTION, NOTES, PAPERS, PAPERS_FILTER};
use paperdigest_pipeline::notes::TRUNCATED_NOTE;
use paperdigest_pipeline::PipelineConfig;
use pretty_assertions::assert_eq;

fn daily_fixtures() -> Vec<Fixture> {
    let mut long = Fixture::new("2512.00004v1", "Scaling open language models", "OpenAI, San Francisco");
    long.pages.push("word ".repeat(200_000));
    vec![
        Fixture::new(
            "2512.00001v1",
            "Retrieval augmented generation for LLMs",
            "Wei Zhang\nTsinghua University, Beijing",
        ),
        Fixture::new("2512.00002v1", "Soil moisture estimation from satellites", "Some Agricultural Institute"),
        Fixture::new("2512.00003v1", "Agents with tool use", "Independent researcher"),
        long,
    ]
}

#[tokio::test]
async fn test_full_run_produces_every_artifact() {
    let h = Harness::new(daily_fixtures(), &[]);
    let summary = h.pipeline(h.config()).run(day()).await.unwrap();

    assert!(summary.completed);
    assert_eq!(
        (summary.found, summary.relevant, summary.downloaded, summary.download_failed),
        (4, 3, 3, 0)
    );
    assert_eq!((summary.kept, summary.removed, summary.still_pending, summary.notes), (2, 1, 0, 2));
    assert_eq!(
        summary.buckets,
        vec![
            ("industry".to_string(), 1),
            ("foreign_academia".to_string(), 0),
            ("domestic_academia".to_string(), 1),
            ("other".to_string(), 0),
        ]
    );

    let run = h.run_dir();
    assert!(run.ends_with("2025-12-09"));
    for name in [PAPERS, PAPERS_FILTER, DOWNLOADED, FILTER_INSTITUTION, NOTES, "notes.txt"] {
        assert!(run.join(name).exists(), "{name} missing");
    }

    // Only the kept papers stay on disk, renamed with their institution.
    assert_eq!(
        file_names(&run.join("papers")),
        vec![
            "2512.00001v1【RAG-清华大学】Retrieval augmented generation for LLMs.pdf".to_string(),
            "2512.00004v1【RAG-OpenAI】Scaling open language models.pdf".to_string(),
        ]
    );

    // Notes sorted by title; bucket images numbered across buckets.
    assert_eq!(
        file_names(&run.join("institution/industry")),
        vec![
            "0_2512.00004v1.png".to_string(),
            "content.txt".to_string(),
            "industry.json".to_string(),
            "industry.txt".to_string(),
        ]
    );
    assert!(run.join("institution/domestic_academia/1_2512.00001v1.png").exists());
    assert_eq!(
        std::fs::read_to_string(run.join("institution/domestic_academia/content.txt")).unwrap(),
        "\n🛎️清华大学\n🔸2512.00001v1：a scripted contribution.\n"
    );
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let h = Harness::new(daily_fixtures(), &["https://arxiv.org/pdf/2512.00003v1"]);
    let first = h.pipeline(h.config()).run(day()).await.unwrap();
    let before = snapshot(&h.run_dir());
    let calls = h.external_calls();
    let renders = h.renderer.calls.load(Ordering::SeqCst);

    let second = h.pipeline(h.config()).run(day()).await.unwrap();

    assert_eq!(h.external_calls(), calls);
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), renders);
    assert_eq!(snapshot(&h.run_dir()), before);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(
        (second.found, second.relevant, second.kept, second.removed, second.notes, second.download_failed),
        (first.found, first.relevant, first.kept, first.removed, first.notes, first.download_failed)
    );
    assert_eq!(second.buckets, first.buckets);
}

#[tokio::test]
async fn test_alias_reply_is_canonicalised() {
    let h = Harness::new(daily_fixtures(), &[]);
    h.pipeline(h.config()).run(day()).await.unwrap();

    let kept = read_json(&h.run_dir().join(FILTER_INSTITUTION));
    let tsinghua = kept
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == "2512.00001v1")
        .unwrap();
    assert_eq!(tsinghua["institution"], "Tsinghua University");
    assert_eq!(tsinghua["first_institution"], "清华大学");
    assert_eq!(tsinghua["institution_category"], "domestic-academia");
    assert!(tsinghua["file_path"].as_str().unwrap().ends_with("【RAG-清华大学】Retrieval augmented generation for LLMs.pdf"));
}

#[tokio::test]
async fn test_irrelevant_papers_never_reach_later_stages() {
    let h = Harness::new(daily_fixtures(), &[]);
    h.pipeline(h.config()).run(day()).await.unwrap();
    let run = h.run_dir();

    let found = std::fs::read_to_string(run.join(PAPERS)).unwrap();
    assert!(found.contains("2512.00002v1"));
    for later in [PAPERS_FILTER, DOWNLOADED, NOTES] {
        let text = std::fs::read_to_string(run.join(later)).unwrap();
        assert!(!text.contains("2512.00002v1"), "soil paper leaked into {later}");
    }
    // Three relevant papers downloaded, the soil paper never requested.
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_removed_paper_has_no_file() {
    let h = Harness::new(daily_fixtures(), &[]);
    h.pipeline(h.config()).run(day()).await.unwrap();

    let rows = read_json(&h.run_dir().join(DOWNLOADED));
    let removed = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == "2512.00003v1")
        .unwrap();
    assert_eq!(removed["institution_status"], "remove");
    let path = std::path::PathBuf::from(removed["file_path"].as_str().unwrap());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_oversized_paper_gets_placeholder_without_model_call() {
    let h = Harness::new(daily_fixtures(), &[]);
    h.pipeline(h.config()).run(day()).await.unwrap();

    let notes = read_json(&h.run_dir().join(NOTES));
    let notes = notes.as_array().unwrap();
    let long = notes.iter().find(|n| n["id"] == "2512.00004v1").unwrap();
    assert_eq!(long["note"], TRUNCATED_NOTE);
    // Only the Tsinghua paper reached the note model.
    assert_eq!(h.note.calls(), 1);
    let short = notes.iter().find(|n| n["id"] == "2512.00001v1").unwrap();
    assert!(short["note"]
        .as_str()
        .unwrap()
        .starts_with("📖Title: Retrieval augmented generation for LLMs\n🌐Source: arXiv, 2512.00001v1\n\n"));
}

fn flaky_fixtures() -> Vec<Fixture> {
    vec![
        Fixture::new("2512.00011v1", "Alpha retrieval", "Tsinghua University"),
        Fixture::new("2512.00012v1", "Beta agents", "FLAKY\nOpenAI"),
        Fixture::new("2512.00013v1", "Gamma benchmark", "Tsinghua University"),
    ]
}

#[tokio::test]
async fn test_pending_rows_stop_the_run_and_resume_later() {
    let h = Harness::new(flaky_fixtures(), &["https://arxiv.org/pdf/2512.00013v1"]);
    h.institution_healthy.store(false, Ordering::SeqCst);

    let first = h.pipeline(h.config()).run(day()).await.unwrap();
    assert!(!first.completed);
    assert_eq!((first.kept, first.still_pending, first.download_failed), (1, 1, 1));
    let run = h.run_dir();
    assert!(!run.join(FILTER_INSTITUTION).exists());
    assert!(!run.join(NOTES).exists());

    let rows = read_json(&run.join(DOWNLOADED));
    let statuses: Vec<(String, String, String)> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["id"].as_str().unwrap().to_string(),
                r["download_status"].as_str().unwrap().to_string(),
                r["institution_status"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("2512.00011v1".to_string(), "downloaded".to_string(), "keep".to_string()),
            ("2512.00012v1".to_string(), "downloaded".to_string(), "pending".to_string()),
            ("2512.00013v1".to_string(), "failed".to_string(), "pending".to_string()),
        ]
    );

    h.institution_healthy.store(true, Ordering::SeqCst);
    let institution_calls = h.institution.calls();
    let downloads = h.downloader.calls.load(Ordering::SeqCst);

    let second = h.pipeline(h.config()).run(day()).await.unwrap();
    assert!(second.completed);
    assert_eq!((second.kept, second.still_pending, second.notes), (2, 0, 2));
    // Only the pending row is asked again; the failed download is not retried.
    assert_eq!(h.institution.calls(), institution_calls + 1);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), downloads);
}

#[tokio::test]
async fn test_finalize_with_pending_excludes_pending_rows() {
    let h = Harness::new(flaky_fixtures(), &[]);
    h.institution_healthy.store(false, Ordering::SeqCst);
    let config = PipelineConfig { finalize_with_pending: true, ..h.config() };

    let summary = h.pipeline(config).run(day()).await.unwrap();
    assert!(summary.completed);
    assert_eq!((summary.kept, summary.still_pending, summary.notes), (2, 1, 2));

    let kept = read_json(&h.run_dir().join(FILTER_INSTITUTION));
    let ids: Vec<&str> = kept.as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["2512.00011v1", "2512.00013v1"]);
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_reported() {
    let h = Harness::new(daily_fixtures(), &[]);
    std::fs::create_dir_all(h.run_dir()).unwrap();
    std::fs::write(h.run_dir().join(PAPERS), b"[{\"id\": ").unwrap();

    let err = h.pipeline(h.config()).run(day()).await.unwrap_err();
    assert!(matches!(err, DigestError::CorruptCheckpoint { .. }));
    assert_eq!(h.external_calls(), 0);
}
