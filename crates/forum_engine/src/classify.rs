use forum_core::ObstacleKind;

/// How a rule's phrases must appear in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    AnyOf(Vec<String>),
    AllOf(Vec<String>),
}

impl Signature {
    pub fn any_of(phrases: &[&str]) -> Self {
        Signature::AnyOf(phrases.iter().map(|p| p.to_string()).collect())
    }

    pub fn all_of(phrases: &[&str]) -> Self {
        Signature::AllOf(phrases.iter().map(|p| p.to_string()).collect())
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Signature::AnyOf(phrases) => phrases.iter().any(|p| text.contains(p.as_str())),
            Signature::AllOf(phrases) => {
                !phrases.is_empty() && phrases.iter().all(|p| text.contains(p.as_str()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRule {
    pub kind: ObstacleKind,
    pub signature: Signature,
}

/// Ordered obstacle rules; the first matching rule decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    rules: Vec<SignatureRule>,
}

impl Classifier {
    pub fn new(rules: Vec<SignatureRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[SignatureRule] {
        &self.rules
    }

    pub fn classify(&self, text: &str) -> Option<ObstacleKind> {
        self.rules
            .iter()
            .find(|rule| rule.signature.matches(text))
            .map(|rule| rule.kind)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(vec![
            SignatureRule {
                kind: ObstacleKind::AntiBotChallenge,
                signature: Signature::any_of(&[
                    "cdn-cgi",
                    "__CF$cv_params",
                    "Checking your browser",
                    "cf-chl-",
                ]),
            },
            SignatureRule {
                kind: ObstacleKind::AuthenticationRequired,
                signature: Signature::any_of(&[
                    "您需要先登录",
                    "您还未登录",
                    "对不起，您无权访问该版块",
                    "无权访问该版块",
                ]),
            },
            SignatureRule {
                kind: ObstacleKind::HumanVerificationRequired,
                signature: Signature::all_of(&["seccode", "验证码"]),
            },
            SignatureRule {
                kind: ObstacleKind::PermissionDenied,
                signature: Signature::any_of(&["您无权进行当前操作"]),
            },
        ])
    }
}

/// Classify with the default forum rules.
pub fn classify(text: &str) -> Option<ObstacleKind> {
    Classifier::default().classify(text)
}
