use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shellgate::error::GatewayError;
use shellgate::error_translation::OutcomeReporter;
use shellgate::security::{CommandValidator, ValidationError};

// Commands as they arrive from SSH clients, accepted and rejected
fn sample_commands() -> Vec<(&'static str, &'static str)> {
    vec![
        ("upload_pack", "git-upload-pack 'group/repo.git'"),
        ("receive_pack", "git-receive-pack group/subgroup/repo.git"),
        ("git_space_form", "git upload-pack group/repo.git"),
        ("lfs_download", "git-lfs-authenticate group/repo.git download"),
        ("recovery_codes", "2fa_recovery_codes"),
        ("quoted_spaces", "git-upload-archive \"group/my repo.git\""),
        ("disallowed_verb", "rm -rf /"),
        ("too_many_args", "git-upload-pack group/repo; rm -rf /"),
        ("unterminated_quote", "git-upload-pack 'group/repo"),
    ]
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_command");
    let validator = CommandValidator::new();

    for (label, command) in sample_commands() {
        group.bench_with_input(BenchmarkId::new("command", label), command, |b, command| {
            b.iter(|| validator.validate(black_box(command)))
        });
    }

    group.finish();
}

fn bench_translate_failure(c: &mut Criterion) {
    let errors = vec![
        GatewayError::DisallowedCommand(ValidationError::InvalidFormat),
        GatewayError::AccessDenied("You are not allowed to push code to this project.".to_string()),
        GatewayError::InvalidRepositoryPath,
        GatewayError::ApiUnreachable,
    ];

    c.bench_function("translate_failures", |b| {
        b.iter(|| {
            for error in &errors {
                black_box(OutcomeReporter::translate(black_box(error)));
            }
        })
    });
}

fn bench_validator_construction(c: &mut Criterion) {
    c.bench_function("validator_new", |b| b.iter(CommandValidator::new));
}

criterion_group!(
    benches,
    bench_validate,
    bench_translate_failure,
    bench_validator_construction
);
criterion_main!(benches);
