pub(crate) const ORGANIZATION: &str = r#"
query Organization($input: OrganizationInput!) {
    organization(input: $input) {
        id
        slug
        name
        chainIds
        tokenIds
        governorIds
        metadata {
            description
            icon
            color
        }
        hasActiveProposals
        proposalsCount
        delegatesCount
        tokenOwnersCount
    }
}"#;

pub(crate) const ORGANIZATIONS: &str = r#"
query Organizations($input: OrganizationsInput) {
    organizations(input: $input) {
        nodes {
            ... on Organization {
                id
                slug
                name
                chainIds
                tokenIds
                governorIds
                metadata {
                    description
                    icon
                }
                hasActiveProposals
                proposalsCount
                delegatesCount
                tokenOwnersCount
            }
        }
    }
}"#;

pub(crate) const PROPOSALS: &str = r#"
query Proposals($input: ProposalsInput!) {
    proposals(input: $input) {
        nodes {
            ... on Proposal {
                id
                metadata {
                    title
                    description
                    ipfsHash
                }
                status
                start {
                    ... on Block {
                        timestamp
                    }
                    ... on BlocklessTimestamp {
                        timestamp
                    }
                }
                end {
                    ... on Block {
                        timestamp
                    }
                    ... on BlocklessTimestamp {
                        timestamp
                    }
                }
                voteStats {
                    type
                    votesCount
                    votersCount
                    percent
                }
                executableCalls {
                    calldata
                    signature
                    target
                    value
                }
                creator {
                    address
                    name
                    ens
                }
            }
        }
    }
}"#;

pub(crate) const DELEGATE: &str = r#"
query Delegate($input: DelegateInput!) {
    delegate(input: $input) {
        delegatorsCount
        votesCount
        account {
            address
            name
            ens
        }
        governor {
            name
            tokenId
            type
        }
        organization {
            name
            proposalsCount
        }
        token {
            symbol
            name
            supply
        }
        statement {
            statement
            isSeekingDelegation
        }
    }
}"#;

pub(crate) const DELEGATES: &str = r#"
query Delegates($input: DelegatesInput!) {
    delegates(input: $input) {
        nodes {
            ... on Delegate {
                delegatorsCount
                votesCount
                account {
                    address
                    name
                    ens
                }
                organization {
                    name
                    proposalsCount
                }
                token {
                    symbol
                    name
                }
                statement {
                    statement
                    isSeekingDelegation
                }
            }
        }
    }
}"#;

pub(crate) const BALANCES: &str = r#"
query Balances($input: BalancesInput!) {
    balances(input: $input) {
        address
        name
        symbol
        decimals
        balance
    }
}"#;
