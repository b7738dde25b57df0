use crypto_data_services::rag::embedder::tokenize;

/// When a rule applies
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Some query token starts with one of the stems, or equals one of the
    /// words (all lower-case)
    AnyKeyword {
        stems: Vec<&'static str>,
        words: Vec<&'static str>,
    },
    Always,
}

impl Predicate {
    pub fn stems(stems: Vec<&'static str>) -> Self {
        Predicate::AnyKeyword {
            stems,
            words: Vec::new(),
        }
    }

    pub fn matches(&self, query: &str) -> bool {
        match self {
            Predicate::AnyKeyword { stems, words } => tokenize(query).iter().any(|token| {
                stems.iter().any(|s| token.starts_with(s))
                    || words.iter().any(|w| token == w)
            }),
            Predicate::Always => true,
        }
    }
}

/// What a matching rule answers with
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Canned(&'static str),
    /// Templated answer built from the retrieved evidence
    Evidence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CannedRule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub response: Response,
}

/// Ordered rule list; the first match wins
#[derive(Debug, Clone, PartialEq)]
pub struct CannedRules {
    rules: Vec<CannedRule>,
}

impl CannedRules {
    pub fn new(rules: Vec<CannedRule>) -> Self {
        Self { rules }
    }

    /// First matching rule. Falls back to evidence when nothing matches.
    pub fn select(&self, query: &str) -> &Response {
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(query))
            .map(|rule| {
                tracing::debug!("Canned rule matched: {}", rule.name);
                &rule.response
            })
            .unwrap_or(&Response::Evidence)
    }

    pub fn rules(&self) -> &[CannedRule] {
        &self.rules
    }
}

impl Default for CannedRules {
    fn default() -> Self {
        Self::new(vec![
            CannedRule {
                name: "regulation",
                predicate: Predicate::AnyKeyword {
                    stems: vec!["regulat", "complian"],
                    words: vec!["law", "laws", "legal", "legality"],
                },
                response: Response::Canned(REGULATION_RESPONSE),
            },
            CannedRule {
                name: "nft",
                predicate: Predicate::stems(vec!["nft", "fungible"]),
                response: Response::Canned(NFT_RESPONSE),
            },
            CannedRule {
                name: "mining",
                predicate: Predicate::stems(vec!["mining", "miner", "hashrate"]),
                response: Response::Canned(MINING_RESPONSE),
            },
            CannedRule {
                name: "evidence",
                predicate: Predicate::Always,
                response: Response::Evidence,
            },
        ])
    }
}

pub const REGULATION_RESPONSE: &str = "Based on recent community discussions about cryptocurrency regulations:\n\n\
1. Many users are concerned about the evolving regulatory landscape across different countries.\n\n\
2. There's significant discussion about the SEC's approach to cryptocurrency in the United States, \
particularly regarding which tokens might be classified as securities.\n\n\
3. Community sentiment suggests that clear regulations could help with institutional adoption, \
though there are concerns about potential restrictions on innovation.\n\n\
4. Several posts highlight that regulatory clarity varies significantly by country, with some nations \
like Singapore and Switzerland establishing more comprehensive frameworks.";

pub const NFT_RESPONSE: &str = "Based on recent community discussions about NFTs and current market trends:\n\n\
1. The NFT market has matured significantly since the 2021 boom, with more focus on utility and long-term value.\n\n\
2. Gaming and metaverse-related NFTs continue to gain traction, with several major gaming companies launching NFT integrations.\n\n\
3. There's growing interest in music NFTs and tokenized royalties, allowing artists to directly connect with fans.\n\n\
4. Environmental concerns regarding NFT minting have led to more collections moving to energy-efficient blockchains \
like Polygon, Solana, and Ethereum post-merge.\n\n\
5. Community sentiment indicates that 'profile picture' NFT projects are seeing less speculative interest, \
while projects offering tangible utility or community benefits are showing more stability.";

pub const MINING_RESPONSE: &str = "Based on recent community discussions about cryptocurrency mining:\n\n\
1. Bitcoin mining profitability is highly dependent on electricity costs, with most profitable operations \
located in regions with low energy costs.\n\n\
2. Following the April 2024 halving event, miners with older equipment have faced increased pressure \
as rewards were cut in half.\n\n\
3. Many small-scale miners have shifted to alternative cryptocurrencies or joined mining pools to maintain profitability.\n\n\
4. There's significant discussion about the environmental impact of mining, with a growing focus on renewable energy sources.\n\n\
5. Community sentiment suggests that while mining is less accessible to individuals than in previous years, \
it remains viable for those with efficient operations and access to cheap electricity.";
