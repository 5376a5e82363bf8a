//! GraphQL documents sent to the Snapshot hub.
//!
//! Every id travels as a variable; nothing is spliced into the document text.

/// Spaces followed by `$wallet`
pub const FOLLOWED_SPACES: &str = r#"query Follows($wallet: String!, $first: Int!) {
  follows(first: $first, where: { follower: $wallet }) {
    follower
    space {
      id
    }
    created
  }
}"#;

/// Active proposals across `$spaces`, newest first
pub const ACTIVE_PROPOSALS: &str = r#"query ActiveProposals($spaces: [String]!, $first: Int!) {
  proposals(
    first: $first
    skip: 0
    where: { space_in: $spaces, state: "active" }
    orderBy: "created"
    orderDirection: desc
  ) {
    id
    title
    body
    choices
    start
    end
    snapshot
    state
    author
    created
    type
    votes
    space {
      id
      name
    }
  }
}"#;

pub const PROPOSAL: &str = r#"query Proposal($id: String!) {
  proposal(id: $id) {
    id
    title
    body
    choices
    start
    end
    snapshot
    state
    author
    created
    type
    votes
    space {
      id
      name
    }
  }
}"#;

/// Most recent votes on `$proposal`
pub const VOTES: &str = r#"query Votes($proposal: String!, $first: Int!) {
  votes(
    first: $first
    skip: 0
    where: { proposal: $proposal }
    orderBy: "created"
    orderDirection: desc
  ) {
    voter
    choice
    created
  }
}"#;

/// At most one vote by `$voter` on `$proposal`
pub const HAS_VOTED: &str = r#"query HasVoted($proposal: String!, $voter: String!) {
  votes(first: 1, where: { proposal: $proposal, voter: $voter }) {
    voter
  }
}"#;

/// Most recently closed proposals of `$space`, with their vote totals
pub const CLOSED_PROPOSALS: &str = r#"query ClosedProposals($space: String!, $first: Int!) {
  proposals(
    first: $first
    skip: 0
    where: { space: $space, state: "closed" }
    orderBy: "created"
    orderDirection: desc
  ) {
    id
    title
    body
    choices
    start
    end
    snapshot
    state
    author
    created
    type
    votes
    space {
      id
      name
    }
  }
}"#;
