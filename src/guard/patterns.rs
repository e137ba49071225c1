use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;

/// Attack-signature families recognized by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatFamily {
    PathTraversal,
    SqlInjection,
    Xss,
    CommandInjection,
}

impl fmt::Display for ThreatFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreatFamily::PathTraversal => write!(f, "path_traversal"),
            ThreatFamily::SqlInjection => write!(f, "sql_injection"),
            ThreatFamily::Xss => write!(f, "xss"),
            ThreatFamily::CommandInjection => write!(f, "command_injection"),
        }
    }
}

/// One named suspicion rule. Rules are evaluated uniformly as a logical OR;
/// the first matching rule decides which family gets logged.
pub struct SuspicionRule {
    pub name: &'static str,
    pub family: ThreatFamily,
    pub regex: Regex,
}

fn rule(name: &'static str, family: ThreatFamily, pattern: &str) -> SuspicionRule {
    SuspicionRule {
        name,
        family,
        regex: Regex::new(pattern).expect("invalid suspicion pattern"),
    }
}

/// The complete rule table.
///
/// Matchers are deliberately stricter than substring search: word boundaries
/// for SQL keywords and shell commands, dot-prefix plus end-of-path anchors
/// for file extensions. Paths like `/admin/reports/performance` or
/// `/videos/asphalt` must never match.
static RULES: Lazy<Vec<SuspicionRule>> = Lazy::new(|| {
    use ThreatFamily::*;
    vec![
        // --- Path traversal / LFI ---
        rule("dot-dot-slash", PathTraversal, r"\.\.[/\\]"),
        rule("encoded-traversal", PathTraversal, r"(?i)%2e%2e(%2f|%5c|[/\\])"),
        rule("double-encoded-traversal", PathTraversal, r"(?i)%252e%252e(%252f|/)"),
        rule("overlong-utf8-traversal", PathTraversal, r"(?i)%c0%ae%c0%ae(%c0%af|/)"),
        rule("null-byte", PathTraversal, r"%00"),
        rule("unix-credential-files", PathTraversal, r"(?i)/etc/(passwd|shadow|group|hosts)"),
        rule("proc-filesystem", PathTraversal, r"(?i)/proc/(self|\d+)"),
        rule("hidden-server-files", PathTraversal, r"(?i)\.(env|git|htaccess|htpasswd)([?/]|$)"),
        rule("ssh-key-files", PathTraversal, r"(?i)id_rsa\b|\.ssh/"),
        rule("well-known-probes", PathTraversal, r"(?i)\b(phpmyadmin|wp-admin|wp-content)\b|phpinfo\.php"),
        // --- SQL injection ---
        rule("union-select", SqlInjection, r"(?i)\bunion(\s+all)?\s+select\b"),
        rule("select-from", SqlInjection, r"(?i)\bselect\b.+\bfrom\b"),
        rule("insert-into", SqlInjection, r"(?i)\binsert\s+into\b"),
        rule("update-set", SqlInjection, r"(?i)\bupdate\s+\S+\s+set\b"),
        rule("delete-from", SqlInjection, r"(?i)\bdelete\s+from\b"),
        rule("drop-table", SqlInjection, r"(?i)\bdrop\s+(table|database)\b"),
        rule("quote-comment", SqlInjection, r"'\s*--"),
        rule("boolean-tautology", SqlInjection, r"(?i)\b(or|and)\s+\d+\s*=\s*\d+"),
        rule("stored-procedure", SqlInjection, r"(?i)\b(xp_|sp_)\w+"),
        rule("time-based-blind", SqlInjection, r"(?i)\b(sleep|benchmark)\s*\(\s*\d"),
        // --- Cross-site scripting ---
        rule("script-tag", Xss, r"(?i)</?script\b"),
        rule("iframe-tag", Xss, r"(?i)<iframe\b"),
        rule("object-embed-tag", Xss, r"(?i)<(object|embed)\b"),
        rule("javascript-uri", Xss, r"(?i)javascript\s*:"),
        rule("event-handler", Xss, r"(?i)\b(onerror|onload|onclick|onfocus|onmouseover)\s*="),
        rule("data-uri-html", Xss, r"(?i)data:text/html"),
        rule("script-call", Xss, r"(?i)\b(alert|prompt|confirm)\s*\("),
        rule("document-cookie", Xss, r"(?i)document\.cookie"),
        // --- Command / file injection ---
        rule("executable-extension", CommandInjection, r"(?i)\.(php|phtml|php[345]|phps|phar)(\?|$)"),
        rule("server-script-extension", CommandInjection, r"(?i)\.(asp|aspx|jsp|jspx|cgi|pl)(\?|$)"),
        rule("binary-extension", CommandInjection, r"(?i)\.(exe|dll|bat|ps1|vbs)(\?|$)"),
        rule("dump-extension", CommandInjection, r"(?i)\.(bak|old|backup|sql)(\?|$)"),
        rule("webshell-name", CommandInjection, r"(?i)\b(shell|backdoor|upload|remote)\.(php|jsp|asp|pl)\b"),
        rule("file-command", CommandInjection, r"(?i)\b(rm|chown|chmod|chgrp|mkdir|rmdir)\s+\S"),
        rule("download-command", CommandInjection, r"(?i)\b(wget|curl)\s+\S"),
        rule("command-chain", CommandInjection, r"(?i)[;|]\s*(cat|ls|rm|wget|curl|bash|sh|nc|whoami)\b"),
        rule("command-substitution", CommandInjection, r"\$\(\s*\w|`[^`]+`"),
        rule("shell-path", CommandInjection, r"(?i)/(usr/)?bin/(ba|z|da|k|c)?sh\b"),
        rule("code-exec-call", CommandInjection, r"(?i)\b(system|exec|shell_exec|passthru|popen|eval)\s*\("),
    ]
});

/// Return the first rule matching the request target (`path?query`), or None.
///
/// The target is tested raw, percent-decoded once, and percent-decoded twice,
/// so single and nested encodings cannot slip past the battery. `+` is also
/// normalized to a space in each form, matching form-encoded query values.
pub fn first_match(target: &str) -> Option<&'static SuspicionRule> {
    let forms = decoded_forms(target);
    RULES
        .iter()
        .find(|rule| forms.iter().any(|form| rule.regex.is_match(form)))
}

fn decoded_forms(target: &str) -> Vec<String> {
    let once = decode_lossy(target);
    let twice = decode_lossy(&once);

    let mut forms: Vec<String> = Vec::with_capacity(6);
    for form in [target.to_string(), once, twice] {
        if form.contains('+') {
            let spaced = form.replace('+', " ");
            if !forms.contains(&spaced) {
                forms.push(spaced);
            }
        }
        if !forms.contains(&form) {
            forms.push(form);
        }
    }
    forms
}

// Invalid percent sequences (overlong UTF-8 probes) fall back to the input,
// which the raw-form patterns still cover.
fn decode_lossy(input: &str) -> String {
    urlencoding::decode(input)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family_of(target: &str) -> Option<ThreatFamily> {
        first_match(target).map(|rule| rule.family)
    }

    #[test]
    fn test_basic_path_traversal() {
        assert_eq!(family_of("/../etc/passwd"), Some(ThreatFamily::PathTraversal));
        assert_eq!(family_of("/images/../../etc/passwd"), Some(ThreatFamily::PathTraversal));
    }

    #[test]
    fn test_encoded_path_traversal() {
        assert_eq!(family_of("/%2e%2e/etc/passwd"), Some(ThreatFamily::PathTraversal));
        assert_eq!(family_of("/theme/%2e%2e/%2e%2e/etc/shadow"), Some(ThreatFamily::PathTraversal));
    }

    #[test]
    fn test_double_encoded_path_traversal() {
        assert_eq!(family_of("/%252e%252e/etc/passwd"), Some(ThreatFamily::PathTraversal));
    }

    #[test]
    fn test_overlong_utf8_traversal() {
        assert_eq!(family_of("/%c0%ae%c0%ae/etc/passwd"), Some(ThreatFamily::PathTraversal));
    }

    #[test]
    fn test_sensitive_file_access() {
        assert_eq!(family_of("/etc/passwd"), Some(ThreatFamily::PathTraversal));
        assert!(first_match("/app/.env").is_some());
        assert!(first_match("/proc/self/environ").is_some());
    }

    #[test]
    fn test_sql_injection_keywords() {
        assert_eq!(
            family_of("/search?query=UNION%20SELECT%20username,password%20FROM%20users"),
            Some(ThreatFamily::SqlInjection)
        );
        assert_eq!(
            family_of("/search?query=SELECT%20*%20FROM%20users%20WHERE%20id%20=%201"),
            Some(ThreatFamily::SqlInjection)
        );
        assert_eq!(
            family_of("/search?query=INSERT%20INTO%20users%20VALUES%20(1)"),
            Some(ThreatFamily::SqlInjection)
        );
        assert_eq!(
            family_of("/search?query=UPDATE%20users%20SET%20password=1"),
            Some(ThreatFamily::SqlInjection)
        );
        assert_eq!(
            family_of("/search?query=DELETE%20FROM%20users%20WHERE%20id=1"),
            Some(ThreatFamily::SqlInjection)
        );
        assert_eq!(
            family_of("/search?query=1;%20DROP%20TABLE%20users"),
            Some(ThreatFamily::SqlInjection)
        );
    }

    #[test]
    fn test_sql_injection_form_encoded_spaces() {
        assert_eq!(
            family_of("/search?query=UNION+SELECT+username+FROM+users"),
            Some(ThreatFamily::SqlInjection)
        );
    }

    #[test]
    fn test_xss_markup() {
        assert_eq!(
            family_of("/profile?bio=%3Cscript%3Ealert(%22xss%22)%3C/script%3E"),
            Some(ThreatFamily::Xss)
        );
        assert_eq!(
            family_of("/profile?bio=%3Ciframe%20src=%22evil.com%22%3E"),
            Some(ThreatFamily::Xss)
        );
        assert_eq!(family_of("/profile?bio=javascript:alert(1)"), Some(ThreatFamily::Xss));
        assert_eq!(
            family_of("/profile?bio=%3Cimg%20src=x%20onerror=alert(1)%3E"),
            Some(ThreatFamily::Xss)
        );
        assert_eq!(
            family_of("/profile?bio=%3Csvg/onload=alert(1)%3E"),
            Some(ThreatFamily::Xss)
        );
    }

    #[test]
    fn test_file_extension_suffix() {
        assert_eq!(family_of("/shell.php"), Some(ThreatFamily::CommandInjection));
        assert_eq!(family_of("/index.phtml"), Some(ThreatFamily::CommandInjection));
        assert_eq!(family_of("/page.asp"), Some(ThreatFamily::CommandInjection));
        assert_eq!(family_of("/app.jsp?x=1"), Some(ThreatFamily::CommandInjection));
        assert_eq!(family_of("/db.sql"), Some(ThreatFamily::CommandInjection));
    }

    #[test]
    fn test_shell_commands() {
        assert!(first_match("/api/clean?cmd=rm%20-rf%20/tmp").is_some());
        assert!(first_match("/api/exec?cmd=chown%20root%20/etc").is_some());
        assert!(first_match("/api/fetch?cmd=wget%20http://evil.example").is_some());
        assert!(first_match("/api/exec?shell=/bin/bash").is_some());
        assert!(first_match("/api/search?q=$(whoami)").is_some());
        assert!(first_match("/api/exec?cmd=test;ls").is_some());
    }

    // Legitimate paths that merely contain keyword fragments must not match.
    #[test]
    fn test_false_positive_command_words() {
        for target in [
            "/admin/reports/performance",
            "/users/confirm/email",
            "/api/platform/image-upload",
            "/api/system/monitor",
            "/items/format/json",
            "/help/chown-me",
            "/contact?message=Could%20you%20clarify%20the%20term?",
        ] {
            assert!(first_match(target).is_none(), "false positive on {target}");
        }
    }

    #[test]
    fn test_false_positive_file_extensions() {
        for target in [
            "/articles/phtml-content",
            "/videos/asphalt",
            "/images/php-logo.png",
            "/downloads/latest.zip?file=my.php.document",
            "/users/jason/profile.json",
            "/app/configs/my.yaml",
            "/data/logs/access.log",
            "/backup/archive.tar.gz",
        ] {
            assert!(first_match(target).is_none(), "false positive on {target}");
        }
    }

    #[test]
    fn test_false_positive_xss_words() {
        for target in [
            "/contact?message=I%20use%20javascript%20for%20validation.",
            "/products?description=Contains%20interesting%20script%20for%20you!",
            "/admin/config?setting=security.script_timeout_ms",
            "/user/profile?bio=My%20favorite%20programming%20language%20is%20javascript.",
            "/blog/post?title=A%20Comprehensive%20Guide%20to%20IFRAME%20Elements",
        ] {
            assert!(first_match(target).is_none(), "false positive on {target}");
        }
    }

    #[test]
    fn test_false_positive_sql_words() {
        for target in [
            "/articles/section/union-street-market",
            "/products?sort=select_best_selling",
            "/orders/status?filter=new-insertions",
            "/documentation/update-procedures",
            "/users/delete-account-instructions",
            "/database/drop-down-options",
            "/search?term=select+language",
            "/articles/union-of-states-history",
        ] {
            assert!(first_match(target).is_none(), "false positive on {target}");
        }
    }

    #[test]
    fn test_ordinary_requests_pass() {
        for target in [
            "/articles/view/1",
            "/users/profile",
            "/images/photo.jpg",
            "/blog/2024/01/my-first-post",
            "/search?q=normal+search+term",
            "/contact?message=Hello+there",
        ] {
            assert!(first_match(target).is_none(), "false positive on {target}");
        }
    }
}
