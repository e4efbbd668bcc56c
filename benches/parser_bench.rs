use criterion::{black_box, criterion_group, criterion_main, Criterion};
use solana_domain_indexer::config::{ParserConfig, DEFAULT_PROGRAM_ID};
use solana_domain_indexer::types::RawTransaction;
use solana_domain_indexer::LogParser;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

fn registration_logs(noise: usize) -> Vec<String> {
    let mut logs = vec![format!("Program {DEFAULT_PROGRAM_ID} invoke [1]")];
    for i in 0..noise {
        logs.push(format!("Program log: Instruction: Step{i}"));
    }
    logs.push("Program log: Buying domain Alice.skr".to_string());
    logs.push(format!("Program {DEFAULT_PROGRAM_ID} success"));
    logs
}

fn parser_benchmark(c: &mut Criterion) {
    let program_id = Pubkey::from_str(DEFAULT_PROGRAM_ID).unwrap();
    let parser = LogParser::new(&ParserConfig::default(), &program_id).unwrap();
    let loose = LogParser::new(
        &ParserConfig {
            loose_match: true,
            ..ParserConfig::default()
        },
        &program_id,
    )
    .unwrap();

    let keys = vec![
        DEFAULT_PROGRAM_ID.to_string(),
        "11111111111111111111111111111111".to_string(),
        Pubkey::new_unique().to_string(),
    ];
    let short = RawTransaction::from_parts("sig1", registration_logs(2), keys.clone());
    let long = RawTransaction::from_parts("sig2", registration_logs(200), keys.clone());
    let miss = RawTransaction::from_parts(
        "sig3",
        vec!["Program log: Instruction: Transfer".to_string(); 50],
        keys,
    );

    let mut group = c.benchmark_group("parser");

    group.bench_function("parse_registration", |b| {
        b.iter(|| parser.parse(black_box(&short)))
    });

    group.bench_function("parse_registration_200_noise_lines", |b| {
        b.iter(|| parser.parse(black_box(&long)))
    });

    group.bench_function("parse_no_match", |b| {
        b.iter(|| parser.parse(black_box(&miss)))
    });

    group.bench_function("parse_no_match_loose", |b| {
        b.iter(|| loose.parse(black_box(&miss)))
    });

    group.finish();
}

criterion_group!(benches, parser_benchmark);
criterion_main!(benches);
