mod common;

use common::*;

use copybarcodes::*;

fn outputs(fixture: &Fixture, sample: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let out = fixture.path("out");
    (
        out.join(format!("pop_{sample}.R1.fq.gz")),
        out.join(format!("pop_{sample}.R2.fq.gz")),
    )
}

#[test]
fn test_exact_matches_only() {
    let fixture = Fixture::new(&forward_records(), &reverse_records(HEADER));
    let summary = run(&fixture.config(), Mode::Demultiplex).unwrap();

    assert_eq!(summary.stats.written, 2);
    assert_eq!(summary.stats.skipped, 1);
    assert_eq!(summary.stats.fuzzed, 0);

    let (r1, r2) = outputs(&fixture, "foo");
    assert_eq!(count_records(&r1), 2);
    assert_eq!(count_records(&r2), 2);

    // every known sample gets its files, even without reads
    let (bar1, _) = outputs(&fixture, "bar");
    assert_eq!(count_records(&bar1), 0);

    assert_eq!(
        summary.totals,
        vec![("foo".to_owned(), 2), ("bar".to_owned(), 0)]
    );
}

#[test]
fn test_fuzzy_match_recovers_pair() {
    let fixture = Fixture::new(&forward_records(), &reverse_records(HEADER));
    let config = Config {
        fuzzy_match: true,
        ..fixture.config()
    };
    let summary = run(&config, Mode::Demultiplex).unwrap();

    assert_eq!(summary.stats.written, 2);
    assert_eq!(summary.stats.fuzzed, 1);
    assert_eq!(summary.stats.skipped, 0);

    let (r1, r2) = outputs(&fixture, "foo");
    assert_eq!(
        read_gz(&r1),
        fastq(&[
            (HEADER, "CAGCAAACCCGGGTTTAAA", "FFFFFFFFFFFFFFFFFFF"),
            (HEADER, "CCGCAAACCCGGGTTTAAA", "F,FFFFFFFFFFFFFFFFF"),
            (HEADER, "CTGCAAACCCGGGTTTAAA", "FFFFFFFFFFFFFFFFFFF"),
        ])
    );
    assert_eq!(read_gz(&r2), reverse_records(HEADER));
}

#[test]
fn test_high_quality_mismatch_is_not_fuzzed() {
    let forward = fastq(&[(HEADER, "AAAACCGCAAACCCGGGTTTAAA", ALL_F)]);
    let reverse = fastq(&[(HEADER, "CCCCC", "FFFFF")]);
    let fixture = Fixture::new(&forward, &reverse);
    let config = Config {
        fuzzy_match: true,
        ..fixture.config()
    };
    let summary = run(&config, Mode::Demultiplex).unwrap();

    assert_eq!(summary.stats.fuzzed, 0);
    assert_eq!(summary.stats.skipped, 1);
    assert_eq!(summary.stats.skipped_quality, 1);
}

#[test]
fn test_routes_by_sample() {
    let forward = fastq(&[
        (HEADER, "AAAACAGCAAACCCGGGTTTAAA", ALL_F),
        (HEADER, "CCCCCAGCAAACCCGGGTTTAAA", ALL_F),
        (HEADER, "CCCCCTGCAAACCCGGGTTTAAA", ALL_F),
    ]);
    let fixture = Fixture::new(&forward, &reverse_records(HEADER));
    let config = Config {
        align: true,
        ..fixture.config()
    };
    run(&config, Mode::Demultiplex).unwrap();

    let out = fixture.path("out");
    assert_eq!(count_records(&out.join("pop_foo.F.fq.gz")), 1);
    assert_eq!(count_records(&out.join("pop_foo.R.fq.gz")), 1);
    assert_eq!(count_records(&out.join("pop_bar.F.fq.gz")), 2);
    assert_eq!(count_records(&out.join("pop_bar.R.fq.gz")), 2);
    assert!(!out.join("pop_foo.R1.fq.gz").exists());
}

#[test]
fn test_header_mismatch_is_excluded() {
    let fixture = Fixture::new(&forward_records(), &reverse_records(OTHER_TILE));
    let config = Config {
        debug_out: true,
        ..fixture.config()
    };
    let summary = run(&config, Mode::Demultiplex).unwrap();

    assert_eq!(summary.stats.skipped_header, 1);
    assert_eq!(summary.stats.written, 1);

    let (r1, _) = outputs(&fixture, "foo");
    assert_eq!(
        read_gz(&r1),
        fastq(&[(HEADER, "CTGCAAACCCGGGTTTAAA", "FFFFFFFFFFFFFFFFFFF")])
    );

    // both unusable pairs end up in the debug file
    let debug = std::fs::read_to_string(fixture.path("out").join(DEBUG_FILE_NAME)).unwrap();
    assert_eq!(debug.lines().count(), 4);
    assert!(debug.starts_with("AAAACAGCAAACCCGGGTTTAAA\n"));
}

#[test]
fn test_nothing_retained() {
    let fixture = Fixture::new(&forward_records(), &reverse_records(HEADER));
    let config = Config {
        percent_to_retain: 0,
        ..fixture.config()
    };
    let summary = run(&config, Mode::Demultiplex).unwrap();

    assert_eq!(summary.stats.redacted, 3);
    assert_eq!(summary.stats.written, 0);

    let (r1, r2) = outputs(&fixture, "foo");
    assert_eq!(count_records(&r1), 0);
    assert_eq!(count_records(&r2), 0);
}

#[test]
fn test_append() {
    let fixture = Fixture::new(&forward_records(), &reverse_records(HEADER));
    let config = Config {
        append: true,
        ..fixture.config()
    };
    run(&config, Mode::Demultiplex).unwrap();
    run(&config, Mode::Demultiplex).unwrap();

    let (r1, _) = outputs(&fixture, "foo");
    assert_eq!(count_records(&r1), 4);

    // without append the files start over
    run(&fixture.config(), Mode::Demultiplex).unwrap();
    assert_eq!(count_records(&r1), 2);
}

#[test]
fn test_multiple_source_files() {
    let fixture = Fixture::new(&forward_records(), &reverse_records(HEADER));
    let forward2 = fixture.path("fwd2.fq");
    let reverse2 = fixture.path("rev2.fq.gz");
    std::fs::write(&forward2, fastq(&[(HEADER, "AAAACAGCTT", "FFFFFFFFFF")])).unwrap();
    write_gz(&reverse2, &fastq(&[(HEADER, "GG", "FF")]));

    let config = Config {
        source_file_forward: Paths::Many(vec![fixture.forward.clone(), forward2]),
        source_file_reverse: Paths::Many(vec![fixture.reverse.clone(), reverse2]),
        persist_threads: 3,
        ..fixture.config()
    };
    let summary = run(&config, Mode::Demultiplex).unwrap();

    assert_eq!(summary.stats.written, 3);
    let (r1, r2) = outputs(&fixture, "foo");
    assert_eq!(count_records(&r1), 3);
    assert_eq!(count_records(&r2), 3);
}

#[test]
fn test_interleaved_source() {
    let fixture = Fixture::new("", "");
    let interleaved = fixture.path("all.fq.gz");
    write_gz(
        &interleaved,
        &fastq(&[
            (HEADER, "AAAACAGCAAACCCGGGTTTAAA", ALL_F),
            (HEADER, "CCCCCAAAGGG", "FFFFFFFFFFF"),
            (HEADER, "CCCCCTGCAAACCCGGGTTTAAA", ALL_F),
            (HEADER, "GGGGGAAACCC", "FFFFFFFFFFF"),
        ]),
    );

    let config = Config {
        source_file_forward: Paths::Empty,
        source_file_reverse: Paths::Empty,
        source_file_interleaved: Paths::One(interleaved),
        ..fixture.config()
    };
    let summary = run(&config, Mode::Demultiplex).unwrap();

    assert_eq!(summary.stats.written, 2);
    assert_eq!(summary.totals, vec![("foo".to_owned(), 1), ("bar".to_owned(), 1)]);
}

#[test]
fn test_missing_input() {
    let fixture = Fixture::new(&forward_records(), &reverse_records(HEADER));
    let config = Config {
        source_file_reverse: Paths::One(fixture.path("missing.fq.gz")),
        ..fixture.config()
    };
    assert!(matches!(
        run(&config, Mode::Demultiplex),
        Err(Error::FileIo { .. })
    ));

    let config = Config {
        overhang: vec!["CAGC".to_owned(), "CT".to_owned()],
        ..fixture.config()
    };
    assert!(matches!(
        run(&config, Mode::Demultiplex),
        Err(Error::MismatchedOverhangs(_))
    ));
}

#[test]
fn test_separator_line_is_kept() {
    let reverse: String = [
        ("CCCCCAAAGGG", "FFFFFFFFFFF"),
        ("GGGGGAAACCC", "FFFFFFFFFFF"),
        ("GGGGGTTTCCC", "FFFFFFFFFFF"),
    ]
    .iter()
    .map(|(seq, qual)| format!("@{HEADER}\n{seq}\n+{HEADER}\n{qual}\n"))
    .collect();
    let fixture = Fixture::new(&forward_records(), &reverse);
    run(&fixture.config(), Mode::Demultiplex).unwrap();

    let (_, r2) = outputs(&fixture, "foo");
    let kept = reverse.lines().take(4).chain(reverse.lines().skip(8));
    assert_eq!(read_gz(&r2), kept.map(|line| format!("{line}\n")).collect::<String>());
}

#[test]
fn test_truncated_input_still_reports_counts() {
    let mut forward = fastq(&[(HEADER, "AAAACAGCAAACCCGGGTTTAAA", ALL_F)]);
    forward.push_str(&format!("@{HEADER}\nAAAAC"));
    let fixture = Fixture::new(&forward, &reverse_records(HEADER));

    let (source, summary) = match run(&fixture.config(), Mode::Demultiplex) {
        Err(Error::Interrupted { source, summary }) => (source, summary),
        other => panic!("expected an interrupted run, got {other:?}"),
    };

    assert!(matches!(*source, Error::ParseRecord { idx: 1, .. }));
    assert!(!summary.complete);
    assert_eq!(summary.stats.written, 1);
    assert!(summary.to_string().starts_with("Stopped, wrote 1, skipped 0,"));

    // outputs are closed and hold what was written before the failure
    let (r1, r2) = outputs(&fixture, "foo");
    assert_eq!(count_records(&r1), 1);
    assert_eq!(count_records(&r2), 1);
}
