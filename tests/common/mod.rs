//! Shared test support: a stub engine binary that mimics the CodeQL CLI
//! surface the orchestrator drives (`database create` / `database analyze`).

use std::path::{Path, PathBuf};

/// The stub honors `--language=` on create (one subdirectory per language),
/// writes a one-finding SARIF document on analyze, and emits the fatal
/// marker on stderr when the source root contains `fatal`. Every invocation
/// is appended to the file named by `QLAGENT_STUB_LOG`, when set.
const STUB_ENGINE: &str = r#"#!/bin/sh
sub="$2"
shift 2
langs="python"
out=""
db=""
src=""
after_sep=0
for arg in "$@"; do
    case "$arg" in
        --language=*) langs="${arg#--language=}" ;;
        --output=*) out="${arg#--output=}" ;;
        --source-root=*) src="${arg#--source-root=}" ;;
        --) after_sep=1 ;;
        --*) ;;
        *) if [ "$after_sep" -eq 1 ] && [ -z "$db" ]; then db="$arg"; fi ;;
    esac
done
if [ -n "$QLAGENT_STUB_LOG" ]; then
    echo "$sub ${src:-$db}" >> "$QLAGENT_STUB_LOG"
fi
case "$src" in
    *fatal*) echo "A fatal error occurred during extraction" >&2; exit 32 ;;
esac
if [ "$sub" = "create" ]; then
    old_ifs="$IFS"; IFS=','
    for lang in $langs; do
        mkdir -p "$db/$lang"
    done
    IFS="$old_ifs"
    exit 0
fi
if [ "$sub" = "analyze" ]; then
    lang=$(basename "$db")
    cat > "$out" <<EOF
{"runs":[{"tool":{"driver":{"rules":[{"id":"$lang/stub-rule","shortDescription":{"text":"Stub finding"},"defaultConfiguration":{"level":"warning"},"properties":{"security-severity":"6.1","precision":"high"}}]}},"results":[{"ruleId":"$lang/stub-rule","locations":[{"physicalLocation":{"artifactLocation":{"uri":"$lang/app.src"},"region":{"startLine":1,"endLine":2}}}]}]}]}
EOF
    exit 0
fi
exit 1
"#;

/// Write the stub engine into `dir` and return its path.
pub fn install_stub_engine(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("codeql-stub");
    std::fs::write(&path, STUB_ENGINE).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
