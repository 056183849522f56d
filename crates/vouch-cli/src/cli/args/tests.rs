use clap::Parser;

use super::*;

#[test]
fn test_run_args_parse() {
    let cli = Cli::try_parse_from([
        "vouch",
        "run",
        "--step",
        "build",
        "-k",
        "a.pem",
        "--attestation",
        "git",
        "--attestor-opt",
        "product.include-glob=dist/*",
        "--",
        "make",
        "-j4",
    ])
    .unwrap();

    let Command::Run(args) = cli.cmd else {
        panic!("expected run");
    };
    assert_eq!(args.step.as_deref(), Some("build"));
    assert_eq!(args.key, vec![std::path::PathBuf::from("a.pem")]);
    assert_eq!(args.attestation, vec!["git"]);
    assert_eq!(args.attestor_opt[0].key, "include-glob");
    assert_eq!(args.command, vec!["make", "-j4"]);
}

#[test]
fn test_key_path_with_comma_is_kept_whole() {
    let cli = Cli::try_parse_from(["vouch", "run", "--key", "keys/a,b.pem", "--key", "c.pem"])
        .unwrap();
    let Command::Run(args) = cli.cmd else {
        panic!("expected run");
    };
    assert_eq!(
        args.key,
        vec![
            std::path::PathBuf::from("keys/a,b.pem"),
            std::path::PathBuf::from("c.pem")
        ]
    );
}

#[test]
fn test_malformed_attestor_opt_is_rejected() {
    let err = Cli::try_parse_from(["vouch", "run", "--attestor-opt", "product"]);
    assert!(err.is_err());
}

#[test]
fn test_keygen_defaults() {
    let cli = Cli::try_parse_from(["vouch", "keygen"]).unwrap();
    let Command::Keygen(args) = cli.cmd else {
        panic!("expected keygen");
    };
    assert_eq!(args.out, std::path::PathBuf::from("."));
    assert!(!args.force);
}
