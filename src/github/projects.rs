//! Project board membership over GraphQL
//!
//! Two schemas are supported: classic projects, which place cards into a named
//! column, and `ProjectV2`, which has plain items. A [`ProjectRef`] with a
//! column targets a classic project.

use crate::error::{Error, Result};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Identifies an organization or user project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    /// Owning organization or user login
    pub owner: String,
    /// Whether the owner is an organization (`orgs/...` URL)
    pub organization: bool,
    /// Project number
    pub number: u64,
    /// Column name; set only for classic projects
    pub column: Option<String>,
}

impl ProjectRef {
    /// Parse a project URL such as `https://github.com/orgs/acme/projects/7`
    pub fn from_url(url: &str, column: Option<String>) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|e| Error::Config(format!("invalid project URL {url}: {e}")))?;
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [kind @ ("orgs" | "users"), owner, "projects", number, ..] => Ok(Self {
                owner: (*owner).to_string(),
                organization: *kind == "orgs",
                number: number
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid project number in {url}")))?,
                column,
            }),
            _ => Err(Error::Config(format!("unrecognised project URL: {url}"))),
        }
    }

    const fn owner_field(&self) -> &'static str {
        if self.organization { "organization" } else { "user" }
    }
}

impl std::fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.owner, self.number)?;
        if let Some(column) = &self.column {
            write!(f, " ({column})")?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct OwnerData<T> {
    #[serde(alias = "user")]
    organization: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectV2Data {
    project_v2: Option<NodeId>,
}

#[derive(Deserialize)]
struct ClassicProjectData {
    project: Option<ClassicProject>,
}

#[derive(Deserialize)]
struct ClassicProject {
    columns: Nodes<NamedNode>,
}

#[derive(Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Deserialize)]
struct NodeId {
    id: String,
}

#[derive(Deserialize)]
struct NamedNode {
    id: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentData {
    node: Option<ContentNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentNode {
    #[serde(default)]
    project_items: Option<Nodes<ProjectItem>>,
    #[serde(default)]
    project_cards: Option<Nodes<ProjectCard>>,
}

#[derive(Deserialize)]
struct ProjectItem {
    id: String,
    project: NodeNumber,
}

#[derive(Deserialize)]
struct ProjectCard {
    id: String,
    project: NodeNumber,
}

#[derive(Deserialize)]
struct NodeNumber {
    number: u64,
}

async fn graphql<T: DeserializeOwned>(
    client: &Octocrab,
    query: &str,
    variables: serde_json::Value,
) -> Result<T> {
    let response: GraphQlResponse<T> = client
        .graphql(&serde_json::json!({ "query": query, "variables": variables }))
        .await
        .map_err(|e| Error::GitHubApi(format!("GraphQL request failed: {e}")))?;

    if let Some(errors) = response.errors
        && !errors.is_empty()
    {
        let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
        return Err(Error::GitHubApi(format!(
            "GraphQL error: {}",
            messages.join(", ")
        )));
    }

    response
        .data
        .ok_or_else(|| Error::GitHubApi("No data in GraphQL response".to_string()))
}

async fn project_v2_id(client: &Octocrab, project: &ProjectRef) -> Result<String> {
    let query = format!(
        "query($owner: String!, $number: Int!) {{
            {}(login: $owner) {{ projectV2(number: $number) {{ id }} }}
        }}",
        project.owner_field()
    );
    let data: OwnerData<ProjectV2Data> = graphql(
        client,
        &query,
        serde_json::json!({ "owner": project.owner, "number": project.number }),
    )
    .await?;

    data.organization
        .and_then(|o| o.project_v2)
        .map(|p| p.id)
        .ok_or_else(|| Error::NotFound(format!("project {project}")))
}

async fn classic_column_id(client: &Octocrab, project: &ProjectRef, column: &str) -> Result<String> {
    let query = format!(
        "query($owner: String!, $number: Int!) {{
            {}(login: $owner) {{ project(number: $number) {{ columns(first: 50) {{ nodes {{ id name }} }} }} }}
        }}",
        project.owner_field()
    );
    let data: OwnerData<ClassicProjectData> = graphql(
        client,
        &query,
        serde_json::json!({ "owner": project.owner, "number": project.number }),
    )
    .await?;

    data.organization
        .and_then(|o| o.project)
        .and_then(|p| p.columns.nodes.into_iter().find(|c| c.name == column))
        .map(|c| c.id)
        .ok_or_else(|| Error::NotFound(format!("column {column} in project {project}")))
}

async fn content_memberships(client: &Octocrab, content_id: &str) -> Result<ContentNode> {
    let data: ContentData = graphql(
        client,
        "query($id: ID!) {
            node(id: $id) {
                ... on Issue {
                    projectItems(first: 50) { nodes { id project { number } } }
                    projectCards(first: 50) { nodes { id project { number } } }
                }
                ... on PullRequest {
                    projectItems(first: 50) { nodes { id project { number } } }
                    projectCards(first: 50) { nodes { id project { number } } }
                }
            }
        }",
        serde_json::json!({ "id": content_id }),
    )
    .await?;

    data.node
        .ok_or_else(|| Error::NotFound(format!("content node {content_id}")))
}

/// Add content (issue or PR node) to a project
pub(super) async fn add_item(client: &Octocrab, project: &ProjectRef, content_id: &str) -> Result<()> {
    if let Some(column) = &project.column {
        let column_id = classic_column_id(client, project, column).await?;
        debug!(%project, %column_id, "adding classic project card");
        let _: serde_json::Value = graphql(
            client,
            "mutation($column: ID!, $content: ID!) {
                addProjectCard(input: { projectColumnId: $column, contentId: $content }) { clientMutationId }
            }",
            serde_json::json!({ "column": column_id, "content": content_id }),
        )
        .await?;
    } else {
        let project_id = project_v2_id(client, project).await?;
        debug!(%project, %project_id, "adding project item");
        let _: serde_json::Value = graphql(
            client,
            "mutation($project: ID!, $content: ID!) {
                addProjectV2ItemById(input: { projectId: $project, contentId: $content }) { item { id } }
            }",
            serde_json::json!({ "project": project_id, "content": content_id }),
        )
        .await?;
    }
    Ok(())
}

/// Remove content from a project; succeeds if it was not on the project
pub(super) async fn remove_item(
    client: &Octocrab,
    project: &ProjectRef,
    content_id: &str,
) -> Result<()> {
    let memberships = content_memberships(client, content_id).await?;

    if project.column.is_some() {
        let cards = memberships.project_cards.map(|c| c.nodes).unwrap_or_default();
        for card in cards.into_iter().filter(|c| c.project.number == project.number) {
            debug!(%project, card = %card.id, "deleting classic project card");
            let _: serde_json::Value = graphql(
                client,
                "mutation($card: ID!) { deleteProjectCard(input: { cardId: $card }) { deletedCardId } }",
                serde_json::json!({ "card": card.id }),
            )
            .await?;
        }
    } else {
        let items = memberships.project_items.map(|i| i.nodes).unwrap_or_default();
        let matching: Vec<ProjectItem> = items
            .into_iter()
            .filter(|i| i.project.number == project.number)
            .collect();
        if matching.is_empty() {
            debug!(%project, "content not on project");
            return Ok(());
        }
        let project_id = project_v2_id(client, project).await?;
        for item in matching {
            debug!(%project, item = %item.id, "deleting project item");
            let _: serde_json::Value = graphql(
                client,
                "mutation($project: ID!, $item: ID!) {
                    deleteProjectV2Item(input: { projectId: $project, itemId: $item }) { deletedItemId }
                }",
                serde_json::json!({ "project": project_id, "item": item.id }),
            )
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_org_project_url() {
        let p = ProjectRef::from_url("https://github.com/orgs/acme/projects/76", None).unwrap();
        assert_eq!(p.owner, "acme");
        assert!(p.organization);
        assert_eq!(p.number, 76);
        assert!(p.column.is_none());
    }

    #[test]
    fn test_parse_user_project_url_with_view() {
        let p = ProjectRef::from_url(
            "https://github.com/users/octocat/projects/3/views/1",
            Some("Backlog".to_string()),
        )
        .unwrap();
        assert_eq!(p.owner, "octocat");
        assert!(!p.organization);
        assert_eq!(p.number, 3);
        assert_eq!(p.to_string(), "octocat#3 (Backlog)");
    }

    #[test]
    fn test_parse_rejects_repo_url() {
        assert!(ProjectRef::from_url("https://github.com/acme/widgets", None).is_err());
        assert!(ProjectRef::from_url("not a url", None).is_err());
    }
}
