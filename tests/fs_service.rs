//! The file-service model exercised end to end: one model driving mocks,
//! verification, and a checking proxy.

use std::sync::atomic::{AtomicUsize, Ordering};

use covenant::prelude::*;
use im::HashSet;
use proptest::prelude::*;
use proptest::strategy::SBoxedStrategy;

type Files = HashSet<String>;

#[derive(Clone, Debug, PartialEq, Eq)]
enum FsArgs {
    CreateFile(String),
    DeleteFile(String),
    FileExists(String),
}

impl Op for FsArgs {
    fn id(&self) -> MethodId {
        match self {
            FsArgs::CreateFile(_) => "create_file",
            FsArgs::DeleteFile(_) => "delete_file",
            FsArgs::FileExists(_) => "file_exists",
        }
    }
}

impl FsArgs {
    fn name(&self) -> &str {
        match self {
            FsArgs::CreateFile(name)
            | FsArgs::DeleteFile(name)
            | FsArgs::FileExists(name) => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum FsRet {
    Ok,
    FileExists,
    Exists(bool),
}

// A small pool so that generated sequences collide on names often.
fn filename() -> SBoxedStrategy<String> {
    proptest::sample::select(vec!["/foo", "/bar", "/baz"])
        .prop_map(|name| name.to_string())
        .sboxed()
}

fn fs_model() -> Model<Files, FsArgs, FsRet> {
    Model::new(Files::new, [
        Method::new(
            "create_file",
            |_: &Files| filename().prop_map(FsArgs::CreateFile).sboxed(),
            |files: &Files, args: &FsArgs| -> Return<Files, FsRet> {
                let name = args.name();
                if files.contains(name) {
                    Return::eq(FsRet::FileExists)
                } else {
                    Return::eq(FsRet::Ok).with_next(files.update(name.to_string()))
                }
            },
        ),
        Method::new(
            "delete_file",
            |files: &Files| {
                proptest::sample::select(files.iter().cloned().collect::<Vec<_>>())
                    .prop_map(FsArgs::DeleteFile)
                    .sboxed()
            },
            |files: &Files, args: &FsArgs| -> Return<Files, FsRet> {
                Return::eq(FsRet::Ok).with_next(files.without(args.name()))
            },
        )
        .with_requires(|files: &Files| !files.is_empty())
        .with_precondition(|files: &Files, args: &FsArgs| files.contains(args.name())),
        Method::new(
            "file_exists",
            |_: &Files| filename().prop_map(FsArgs::FileExists).sboxed(),
            |files: &Files, args: &FsArgs| -> Return<Files, FsRet> {
                Return::eq(FsRet::Exists(files.contains(args.name())))
            },
        ),
    ])
    .unwrap()
}

/// An honest file service.
#[derive(Default)]
struct FsService {
    files: std::collections::HashSet<String>,
}

impl Subject<FsArgs> for FsService {
    type Ret = FsRet;

    fn apply(&mut self, args: &FsArgs) -> FsRet {
        match args {
            FsArgs::CreateFile(name) => {
                if self.files.insert(name.clone()) {
                    FsRet::Ok
                } else {
                    FsRet::FileExists
                }
            }
            FsArgs::DeleteFile(name) => {
                self.files.remove(name);
                FsRet::Ok
            }
            FsArgs::FileExists(name) => FsRet::Exists(self.files.contains(name)),
        }
    }
}

/// Claims every create succeeded and remembers nothing.
struct AmnesiacFs;

impl Subject<FsArgs> for AmnesiacFs {
    type Ret = FsRet;

    fn apply(&mut self, args: &FsArgs) -> FsRet {
        match args {
            FsArgs::CreateFile(_) | FsArgs::DeleteFile(_) => FsRet::Ok,
            FsArgs::FileExists(_) => FsRet::Exists(false),
        }
    }
}

#[test]
fn model_is_internally_consistent() {
    check_model(&fs_model(), &VerifyOptions::default()).unwrap();
}

#[test]
fn mock_is_deterministic_on_repeated_creates() {
    let mock = fs_model().mock();
    assert_eq!(
        mock.call(&FsArgs::CreateFile("x".into())).unwrap(),
        FsRet::Ok
    );
    assert_eq!(
        mock.call(&FsArgs::CreateFile("x".into())).unwrap(),
        FsRet::FileExists
    );
}

#[test]
fn mock_survives_a_hundred_concurrent_callers() {
    let mock = fs_model().mock();
    let hits = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for i in 0..100 {
            let mock = mock.clone();
            let hits = &hits;
            scope.spawn(move || {
                let name = format!("/f{i}");
                assert_eq!(
                    mock.call(&FsArgs::CreateFile(name.clone())).unwrap(),
                    FsRet::Ok
                );
                if mock.call(&FsArgs::FileExists(name)).unwrap() == FsRet::Exists(true) {
                    hits.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });
    assert_eq!(hits.load(Ordering::Relaxed), 100);
}

#[test]
fn verify_passes_a_faithful_service() {
    verify(&fs_model(), FsService::default, &VerifyOptions::default()).unwrap();
}

#[test]
fn the_mock_conforms_to_its_own_model() {
    let model = fs_model();
    verify(&model, || model.mock(), &VerifyOptions::default()).unwrap();
}

#[test]
fn verify_shrinks_the_amnesiac_service_to_two_calls() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let model = fs_model();
    let err = verify(&model, || AmnesiacFs, &VerifyOptions::default()).unwrap_err();
    let minimal = err.counterexample().expect("falsified, not aborted");

    assert_eq!(minimal.len(), 2, "not minimal:\n{minimal:?}");
    assert_eq!(minimal[0].method, "create_file");
    assert!(
        ["create_file", "delete_file", "file_exists"].contains(&minimal[1].method),
        "unexpected second call:\n{minimal:?}"
    );
    assert_eq!(minimal[0].args.name(), minimal[1].args.name());

    // The minimal trace is a genuine counterexample.
    assert!(run_trace(minimal, AmnesiacFs).is_err());
}

#[test]
fn proxy_flags_the_second_create_of_one_name() {
    let mut proxy = fs_model().proxy(AmnesiacFs);
    assert_eq!(
        proxy.try_apply(&FsArgs::CreateFile("/foo".into())).unwrap(),
        FsRet::Ok
    );
    let err = proxy
        .try_apply(&FsArgs::CreateFile("/foo".into()))
        .unwrap_err();
    let ProxyError::Violation(violation) = err else {
        panic!("expected a contract violation, got {err}")
    };
    assert_eq!(violation.method, "create_file");
    assert_eq!(violation.expected, format!("== {:?}", FsRet::FileExists));
    assert_eq!(violation.actual, format!("{:?}", FsRet::Ok));
}

#[test]
fn mocks_sharing_a_store_observe_each_other() {
    let model = fs_model();
    let store = StateCell::new(Files::new());
    let mock_a = model.mock_with(MockOptions {
        store: Some(store.clone()),
        seed: None,
    });
    let mock_b = model.mock_with(MockOptions {
        store: Some(store),
        seed: None,
    });
    assert_eq!(
        mock_a.call(&FsArgs::CreateFile("y".into())).unwrap(),
        FsRet::Ok
    );
    assert_eq!(
        mock_b.call(&FsArgs::FileExists("y".into())).unwrap(),
        FsRet::Exists(true)
    );
}

proptest! {
    /// Whatever sequence the generator proposes, delete targets files that
    /// exist and nothing is ever asked of a method before its `requires`
    /// opens up.
    #[test]
    fn generated_sequences_replay_cleanly(trace in fs_model().calls(1..=10)) {
        let model = fs_model();
        let pairs = trace.pairs();
        for prefix in 0..=pairs.len() {
            prop_assert!(model.replay(pairs[..prefix].to_vec()).is_ok());
        }
    }
}
