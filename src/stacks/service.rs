//! Service stack - static site delivery plus the GraphQL function and API

use topology::{
    DependencyGraph, RemovalPolicy, ResourceKind, ResourceNode, Result, StageContext, Value,
    qualified_id,
};

use super::{Components, StackOutputs};

pub const BUCKET: &str = "WebAssetsBucket";
pub const DEFAULT_PAGE: &str = "DeployDefaultPage";
pub const DISTRIBUTION: &str = "Distribution";
pub const FUNCTION: &str = "GraphqlFunction";
pub const HTTP_API: &str = "HttpApi";
pub const ROUTE: &str = "GraphqlRoute";

/// Output attribute names produced by the provisioning backend
pub const BUCKET_NAME: &str = "bucketName";
pub const BUCKET_DOMAIN: &str = "bucketRegionalDomainName";
pub const DISTRIBUTION_URL: &str = "url";
pub const FUNCTION_ARN: &str = "functionArn";
pub const SECRET_ARN: &str = "secretArn";
pub const API_ID: &str = "apiId";

const DEFAULT_PAGE_HTML: &str = "<!DOCTYPE html><html></html>";
const ERROR_PAGE_TTL_SECONDS: i64 = 30;
const ERROR_STATUSES: [i64; 3] = [403, 404, 500];

/// Add the service stack to `graph`, returning what it exports
pub fn build(
    graph: &mut DependencyGraph,
    stage: &StageContext,
    components: &Components,
) -> Result<StackOutputs> {
    let name = stage.name();
    let bucket_id = qualified_id(name, BUCKET);
    let page_id = qualified_id(name, DEFAULT_PAGE);
    let distribution_id = qualified_id(name, DISTRIBUTION);
    let function_id = qualified_id(name, FUNCTION);

    // Assets are always disposable; the page is redeployed on every apply.
    graph.add_node(
        ResourceNode::new(name, BUCKET, ResourceKind::Bucket)
            .with("removalPolicy", RemovalPolicy::Destroy.as_str())
            .with("autoDeleteObjects", true)
            .with("versioned", true)
            .with("publicReadAccess", false)
            .with("blockPublicAccess", "BLOCK_ALL"),
    )?;

    graph.add_node(
        ResourceNode::new(name, DEFAULT_PAGE, ResourceKind::Deployment)
            .with(
                "sources",
                Value::List(vec![Value::map([
                    ("key", Value::from("index.html")),
                    ("data", Value::from(DEFAULT_PAGE_HTML)),
                ])]),
            )
            .with("destinationBucket", Value::reference(&bucket_id, BUCKET_NAME))
            .with("prune", false),
    )?;
    graph.add_edge(&bucket_id, &page_id);

    graph.add_node(distribution(stage, &bucket_id))?;
    graph.add_edge(&bucket_id, &distribution_id);
    // The distribution serves the default page, so the page must land first.
    graph.add_edge(&page_id, &distribution_id);

    graph.add_node(function(stage, components))?;

    if let Some(secret) = &components.secret {
        let secret_id = qualified_id(name, secret);
        graph.add_node(
            ResourceNode::new(name, secret, ResourceKind::Secret)
                .with("secretName", secret_id.as_str())
                .with("removalPolicy", stage.removal_policy().as_str()),
        )?;
        graph.add_edge(&secret_id, &function_id);
    }

    if components.api {
        let api_id = qualified_id(name, HTTP_API);
        let route_id = qualified_id(name, ROUTE);

        graph.add_node(http_api(stage, &distribution_id))?;
        // Allowed origins include the distribution's generated domain.
        graph.add_edge(&distribution_id, &api_id);

        graph.add_node(
            ResourceNode::new(name, ROUTE, ResourceKind::Route)
                .with("routeKey", "POST /graphql")
                .with("api", Value::reference(&api_id, API_ID))
                .with("integration", Value::reference(&function_id, FUNCTION_ARN)),
        )?;
        graph.add_edge(&api_id, &route_id);
        graph.add_edge(&function_id, &route_id);
    }

    Ok(StackOutputs::in_graph(function_id))
}

fn distribution(stage: &StageContext, bucket_id: &str) -> ResourceNode {
    let error_responses = ERROR_STATUSES
        .iter()
        .map(|&status| {
            Value::map([
                ("httpStatus", Value::from(status)),
                ("responseHttpStatus", Value::from(status)),
                ("responsePagePath", Value::from("/index.html")),
                ("ttlSeconds", Value::from(ERROR_PAGE_TTL_SECONDS)),
            ])
        })
        .collect::<Vec<_>>();

    let origin = Value::map([
        ("domainName", Value::reference(bucket_id, BUCKET_DOMAIN)),
        (
            "originAccessIdentity",
            Value::from(qualified_id(stage.name(), "OriginAccessIdentity")),
        ),
    ]);

    let mut node = ResourceNode::new(stage.name(), DISTRIBUTION, ResourceKind::Distribution)
        .with("defaultRootObject", "/index.html")
        .with("errorResponses", error_responses)
        .with(
            "defaultBehavior",
            Value::map([
                ("origin", origin),
                ("cachePolicy", Value::from("CACHING_OPTIMIZED")),
                ("viewerProtocolPolicy", Value::from("REDIRECT_TO_HTTPS")),
            ]),
        );

    if let Some(domain) = stage.domain() {
        node.set("domainNames", Value::list([domain]));
    }
    node
}

fn function(stage: &StageContext, components: &Components) -> ResourceNode {
    let name = stage.name();
    let mut environment = vec![("STAGE", Value::from(name))];
    if let Some(secret) = &components.secret {
        environment.push((
            "SECRET_ARN",
            Value::reference(qualified_id(name, secret), SECRET_ARN),
        ));
    }
    if components.tables {
        // Literal name: a reference would make the table a dependency of the
        // function while the table grant already depends on the function.
        environment.push((
            "TABLE_NAME",
            Value::from(super::tables::table_name(name)),
        ));
    }

    ResourceNode::new(name, FUNCTION, ResourceKind::Function)
        .with("runtime", "nodejs20.x")
        .with("handler", "index.handler")
        .with("memorySize", 512_i64)
        .with("timeoutSeconds", 30_i64)
        .with("environment", Value::map(environment))
}

fn http_api(stage: &StageContext, distribution_id: &str) -> ResourceNode {
    let mut origins: Vec<Value> = stage
        .cors_origins()
        .iter()
        .map(|o| Value::from(o.as_str()))
        .collect();
    if let Some(domain) = stage.domain() {
        origins.push(Value::from(format!("https://{}", domain)));
    }
    origins.push(Value::reference(distribution_id, DISTRIBUTION_URL));

    ResourceNode::new(stage.name(), HTTP_API, ResourceKind::HttpApi)
        .with("apiName", qualified_id(stage.name(), HTTP_API))
        .with(
            "corsPreflight",
            Value::map([
                ("allowOrigins", Value::List(origins)),
                ("allowMethods", Value::list(["GET", "POST", "OPTIONS"])),
                ("allowHeaders", Value::list(["Content-Type", "Authorization"])),
                ("maxAgeSeconds", Value::from(86_400_i64)),
            ]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_with(stage: &StageContext, components: &Components) -> DependencyGraph {
        let mut graph = DependencyGraph::new(stage.name());
        build(&mut graph, stage, components).unwrap();
        graph
    }

    #[test]
    fn test_bucket_is_always_destroyed() {
        let prod = StageContext::named("Prod").unwrap();
        let graph = build_with(&prod, &Components::default());
        let bucket = graph.node("Prod-WebAssetsBucket").unwrap();
        assert_eq!(bucket.property("removalPolicy"), Some(&Value::from("destroy")));
        assert_eq!(bucket.property("autoDeleteObjects"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_cors_origins_include_distribution_url() {
        let beta = StageContext::new(
            "Beta",
            None,
            ["http://localhost:3000"],
            Some("beta.example.com".to_string()),
        )
        .unwrap();
        let graph = build_with(&beta, &Components::default());
        let api = graph.node("Beta-HttpApi").unwrap();
        let Some(Value::Map(cors)) = api.property("corsPreflight") else {
            panic!("missing corsPreflight");
        };
        assert_eq!(
            cors["allowOrigins"],
            Value::List(vec![
                Value::from("http://localhost:3000"),
                Value::from("https://beta.example.com"),
                Value::reference("Beta-Distribution", DISTRIBUTION_URL),
            ])
        );
        assert!(
            graph
                .dependencies_of("Beta-HttpApi")
                .contains(&"Beta-Distribution")
        );

        let distribution = graph.node("Beta-Distribution").unwrap();
        assert_eq!(
            distribution.property("domainNames"),
            Some(&Value::list(["beta.example.com"]))
        );
    }

    #[test]
    fn test_without_api_or_secret() {
        let beta = StageContext::named("Beta").unwrap();
        let components = Components {
            api: false,
            secret: None,
            ..Components::default()
        };
        let graph = build_with(&beta, &components);
        assert!(graph.node("Beta-HttpApi").is_none());
        assert!(graph.node("Beta-GraphqlRoute").is_none());
        assert_eq!(graph.nodes_of_kind(ResourceKind::Secret).count(), 0);
        assert!(graph.dependencies_of("Beta-GraphqlFunction").is_empty());
    }

    #[test]
    fn test_error_responses() {
        let beta = StageContext::named("Beta").unwrap();
        let graph = build_with(&beta, &Components::default());
        let distribution = graph.node("Beta-Distribution").unwrap();
        let responses = distribution
            .property("errorResponses")
            .and_then(Value::as_list)
            .unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(
            distribution.property("defaultRootObject"),
            Some(&Value::from("/index.html"))
        );
    }

    #[test]
    fn test_exports_function_node() {
        let beta = StageContext::named("Beta").unwrap();
        let mut graph = DependencyGraph::new("Beta");
        let outputs = build(&mut graph, &beta, &Components::default()).unwrap();
        assert_eq!(outputs.function_node(), Some("Beta-GraphqlFunction"));
    }
}
