//! Unit tests for container group specs and realized-state derivation.

use std::io::Write;

use groupctl::models::group::{
    Container, ContainerGroup, ContainerGroupSpec, ContainerGroupState, ContainerSpec, OsType,
    RestartPolicy,
};
use groupctl::AppError;

const SPEC: &str = r#"
name = "g1"
restart_policy = "OnFailure"

[ip_address]
ports = [80]
dns_name_label = "g1-demo"

[[containers]]
name = "web"
image = "nginx:1.27"
ports = [80]

[containers.resources]
cpu = 0.5
memory_gb = 1.5

[[containers]]
name = "db"
image = "postgres:16"

[containers.environment]
POSTGRES_PASSWORD = "example"
"#;

fn two_containers() -> ContainerGroupSpec {
    ContainerGroupSpec::new(
        "g1",
        vec![
            ContainerSpec::new("web", "nginx:1.27"),
            ContainerSpec::new("db", "postgres:16"),
        ],
    )
}

#[test]
fn toml_spec_parses_with_defaults() {
    let spec = ContainerGroupSpec::from_toml_str(SPEC).expect("spec parses");

    assert_eq!(spec.name, "g1");
    assert_eq!(spec.os_type, OsType::Linux);
    assert_eq!(spec.restart_policy, RestartPolicy::OnFailure);
    assert_eq!(spec.location, None);
    assert_eq!(spec.containers.len(), 2);
    assert!((spec.containers[0].resources.cpu - 0.5).abs() < f64::EPSILON);
    assert!((spec.containers[0].resources.memory_gb - 1.5).abs() < f64::EPSILON);
    assert!((spec.containers[1].resources.cpu - 1.0).abs() < f64::EPSILON);
    assert_eq!(
        spec.containers[1].environment.get("POSTGRES_PASSWORD"),
        Some(&"example".to_owned())
    );
    assert_eq!(
        spec.ip_address.as_ref().and_then(|ip| ip.dns_name_label.as_deref()),
        Some("g1-demo")
    );
}

#[test]
fn load_from_path_validates() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(b"name = \"g1\"\ncontainers = []\n")
        .expect("write spec");

    let err = ContainerGroupSpec::load_from_path(file.path()).expect_err("no containers");
    assert!(matches!(err, AppError::Validation(_)), "{err}");
}

#[test]
fn valid_spec_passes() {
    two_containers().validate().expect("valid");
}

#[test]
fn empty_name_is_rejected() {
    let mut spec = two_containers();
    spec.name.clear();
    let err = spec.validate().expect_err("empty name");
    assert!(err.to_string().contains("must not be empty"), "{err}");
}

#[test]
fn malformed_names_are_rejected() {
    let too_long = "a".repeat(64);
    for name in ["G1", "-g1", "g1-", "g_1", too_long.as_str()] {
        let mut spec = two_containers();
        spec.name = name.to_owned();
        assert!(
            matches!(spec.validate(), Err(AppError::Validation(_))),
            "{name:?} should be rejected"
        );
    }
}

#[test]
fn empty_container_list_is_rejected() {
    let spec = ContainerGroupSpec::new("g1", Vec::new());
    let err = spec.validate().expect_err("no containers");
    assert!(err.to_string().contains("at least one container"), "{err}");
}

#[test]
fn duplicate_container_names_are_rejected() {
    let spec = ContainerGroupSpec::new(
        "g1",
        vec![
            ContainerSpec::new("web", "nginx"),
            ContainerSpec::new("web", "httpd"),
        ],
    );
    let err = spec.validate().expect_err("duplicate");
    assert!(err.to_string().contains("duplicate container name"), "{err}");
}

#[test]
fn blank_image_is_rejected() {
    let spec = ContainerGroupSpec::new("g1", vec![ContainerSpec::new("web", " ")]);
    let err = spec.validate().expect_err("no image");
    assert!(err.to_string().contains("no image"), "{err}");
}

#[test]
fn derived_state_follows_provisioning_state() {
    let base = ContainerGroup {
        name: "g1".into(),
        containers: vec![Container {
            name: "web".into(),
            image: "nginx".into(),
            current_state: Some("Running".into()),
        }],
        provisioning_state: None,
        ip_address: None,
        state: ContainerGroupState::Ready,
    };

    assert_eq!(base.clone().with_derived_state().state, ContainerGroupState::Unknown);

    let cases = [
        ("Succeeded", ContainerGroupState::Ready),
        ("Pending", ContainerGroupState::Creating),
        ("Updating", ContainerGroupState::Creating),
        ("Deleting", ContainerGroupState::Deleted),
        ("Failed", ContainerGroupState::Unknown),
    ];
    for (raw, expected) in cases {
        let mut group = base.clone();
        group.provisioning_state = Some(raw.into());
        assert_eq!(group.with_derived_state().state, expected, "{raw}");
    }
}

#[test]
fn container_lookup_by_name() {
    let group = ContainerGroup {
        name: "g1".into(),
        containers: vec![Container {
            name: "web".into(),
            image: "nginx".into(),
            current_state: None,
        }],
        provisioning_state: None,
        ip_address: None,
        state: ContainerGroupState::Unknown,
    };
    assert!(group.container("web").is_some());
    assert!(group.container("db").is_none());
}
